//! Embedded DDL, applied at connect time rather than through a separate
//! migrations directory — every statement is `CREATE ... IF NOT EXISTS`, so
//! re-applying it against an already-bootstrapped database is a no-op.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{debug, info, instrument};

const TABLES: &[(&str, &str)] = &[
    ("document_number_seq", r#"
        CREATE SEQUENCE IF NOT EXISTS document_number_seq;
    "#),
    ("supplier_identities", r#"
        CREATE TABLE IF NOT EXISTS supplier_identities (
            id UUID PRIMARY KEY,
            grid_participant_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            state TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ
        );
    "#),
    ("customers", r#"
        CREATE TABLE IF NOT EXISTS customers (
            id UUID PRIMARY KEY,
            supplier_identity_id UUID NOT NULL REFERENCES supplier_identities(id),
            identity_kind TEXT NOT NULL,
            identity_value TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ
        );
    "#),
    ("metering_points", r#"
        CREATE TABLE IF NOT EXISTS metering_points (
            id UUID PRIMARY KEY,
            gsrn TEXT NOT NULL UNIQUE,
            metering_point_type TEXT NOT NULL,
            category TEXT NOT NULL,
            settlement_method TEXT NOT NULL,
            resolution TEXT NOT NULL,
            connection_state TEXT NOT NULL,
            grid_area_code TEXT NOT NULL,
            grid_company_id TEXT NOT NULL,
            address_json JSONB,
            has_active_supply BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ
        );
    "#),
    ("supplies", r#"
        CREATE TABLE IF NOT EXISTS supplies (
            id UUID PRIMARY KEY,
            metering_point_id UUID NOT NULL REFERENCES metering_points(id),
            customer_id UUID NOT NULL REFERENCES customers(id),
            period_start TIMESTAMPTZ NOT NULL,
            period_end TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ
        );
        CREATE INDEX IF NOT EXISTS idx_supplies_metering_point ON supplies(metering_point_id);
    "#),
    ("supplier_products", r#"
        CREATE TABLE IF NOT EXISTS supplier_products (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            pricing_model TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ
        );
    "#),
    ("supply_product_periods", r#"
        CREATE TABLE IF NOT EXISTS supply_product_periods (
            id UUID PRIMARY KEY,
            supply_id UUID NOT NULL REFERENCES supplies(id),
            product_id UUID NOT NULL REFERENCES supplier_products(id),
            period_start TIMESTAMPTZ NOT NULL,
            period_end TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_supply_product_periods_supply ON supply_product_periods(supply_id);
    "#),
    ("supplier_margin_steps", r#"
        CREATE TABLE IF NOT EXISTS supplier_margin_steps (
            id UUID PRIMARY KEY,
            product_id UUID NOT NULL REFERENCES supplier_products(id),
            valid_from TIMESTAMPTZ NOT NULL,
            rate NUMERIC(20, 6) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_supplier_margin_steps_product ON supplier_margin_steps(product_id, valid_from);
    "#),
    ("prices", r#"
        CREATE TABLE IF NOT EXISTS prices (
            id UUID PRIMARY KEY,
            charge_id TEXT NOT NULL,
            owner_gln TEXT NOT NULL,
            price_type TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            period_start TIMESTAMPTZ NOT NULL,
            period_end TIMESTAMPTZ,
            is_vat_exempt BOOLEAN NOT NULL,
            is_tax BOOLEAN NOT NULL,
            is_pass_through BOOLEAN NOT NULL,
            resolution TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ,
            UNIQUE(charge_id, owner_gln)
        );
    "#),
    ("price_points", r#"
        CREATE TABLE IF NOT EXISTS price_points (
            id UUID PRIMARY KEY,
            price_id UUID NOT NULL REFERENCES prices(id),
            timestamp TIMESTAMPTZ NOT NULL,
            rate NUMERIC(20, 6) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_price_points_price_ts ON price_points(price_id, timestamp);
    "#),
    ("price_links", r#"
        CREATE TABLE IF NOT EXISTS price_links (
            id UUID PRIMARY KEY,
            price_id UUID NOT NULL REFERENCES prices(id),
            metering_point_id UUID NOT NULL REFERENCES metering_points(id),
            period_start TIMESTAMPTZ NOT NULL,
            period_end TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ
        );
        CREATE INDEX IF NOT EXISTS idx_price_links_mp ON price_links(metering_point_id, price_id);
    "#),
    ("time_series", r#"
        CREATE TABLE IF NOT EXISTS time_series (
            id UUID PRIMARY KEY,
            metering_point_id UUID NOT NULL REFERENCES metering_points(id),
            period_start TIMESTAMPTZ NOT NULL,
            period_end TIMESTAMPTZ,
            resolution TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_latest BOOLEAN NOT NULL,
            transaction_id TEXT,
            received_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_time_series_mp_latest ON time_series(metering_point_id, is_latest);
    "#),
    ("observations", r#"
        CREATE TABLE IF NOT EXISTS observations (
            id UUID PRIMARY KEY,
            time_series_id UUID NOT NULL REFERENCES time_series(id),
            timestamp TIMESTAMPTZ NOT NULL,
            quantity NUMERIC(20, 3) NOT NULL,
            quality TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_observations_ts_timestamp ON observations(time_series_id, timestamp);
    "#),
    ("aggregated_time_series", r#"
        CREATE TABLE IF NOT EXISTS aggregated_time_series (
            id UUID PRIMARY KEY,
            grid_area_code TEXT NOT NULL,
            period_start TIMESTAMPTZ NOT NULL,
            period_end TIMESTAMPTZ,
            quantity NUMERIC(20, 3) NOT NULL,
            received_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_aggregated_ts_area_period ON aggregated_time_series(grid_area_code, period_start);
    "#),
    ("wholesale_settlements", r#"
        CREATE TABLE IF NOT EXISTS wholesale_settlements (
            id UUID PRIMARY KEY,
            grid_area_code TEXT NOT NULL,
            grid_company_id TEXT NOT NULL,
            period_start TIMESTAMPTZ NOT NULL,
            period_end TIMESTAMPTZ,
            amount NUMERIC(20, 2) NOT NULL,
            received_at TIMESTAMPTZ NOT NULL
        );
    "#),
    ("spot_prices", r#"
        CREATE TABLE IF NOT EXISTS spot_prices (
            id UUID PRIMARY KEY,
            bidding_area TEXT NOT NULL,
            timestamp TIMESTAMPTZ NOT NULL,
            rate NUMERIC(20, 6) NOT NULL,
            received_at TIMESTAMPTZ NOT NULL,
            UNIQUE(bidding_area, timestamp)
        );
        CREATE INDEX IF NOT EXISTS idx_spot_prices_area_ts ON spot_prices(bidding_area, timestamp);
    "#),
    ("settlements", r#"
        CREATE TABLE IF NOT EXISTS settlements (
            id UUID PRIMARY KEY,
            metering_point_id UUID NOT NULL REFERENCES metering_points(id),
            supply_id UUID NOT NULL REFERENCES supplies(id),
            period_start TIMESTAMPTZ NOT NULL,
            period_end TIMESTAMPTZ,
            time_series_id UUID NOT NULL REFERENCES time_series(id),
            time_series_version INTEGER NOT NULL,
            total_energy NUMERIC(20, 3) NOT NULL,
            total_amount NUMERIC(20, 2) NOT NULL,
            status TEXT NOT NULL,
            is_correction BOOLEAN NOT NULL,
            previous_settlement_id UUID REFERENCES settlements(id),
            invoice_reference TEXT,
            invoiced_at TIMESTAMPTZ,
            document_number TEXT NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_settlements_status ON settlements(status);
        CREATE INDEX IF NOT EXISTS idx_settlements_mp ON settlements(metering_point_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_settlements_ts_version ON settlements(time_series_id, time_series_version);
    "#),
    ("settlement_lines", r#"
        CREATE TABLE IF NOT EXISTS settlement_lines (
            id UUID PRIMARY KEY,
            settlement_id UUID NOT NULL REFERENCES settlements(id),
            description TEXT NOT NULL,
            source TEXT NOT NULL,
            quantity NUMERIC(20, 3) NOT NULL,
            unit_price NUMERIC(20, 6) NOT NULL,
            amount NUMERIC(20, 2) NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_settlement_lines_settlement ON settlement_lines(settlement_id);
    "#),
    ("settlement_issues", r#"
        CREATE TABLE IF NOT EXISTS settlement_issues (
            id UUID PRIMARY KEY,
            metering_point_id UUID NOT NULL REFERENCES metering_points(id),
            time_series_id UUID NOT NULL REFERENCES time_series(id),
            time_series_version INTEGER NOT NULL,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            detail TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            resolved_at TIMESTAMPTZ
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_settlement_issues_open_key
            ON settlement_issues(metering_point_id, time_series_id, time_series_version)
            WHERE status = 'open';
    "#),
    ("inbox_messages", r#"
        CREATE TABLE IF NOT EXISTS inbox_messages (
            id UUID PRIMARY KEY,
            message_id TEXT NOT NULL UNIQUE,
            document_type TEXT NOT NULL,
            business_process TEXT NOT NULL,
            sender_id TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            payload JSONB NOT NULL,
            received_at TIMESTAMPTZ NOT NULL,
            is_processed BOOLEAN NOT NULL DEFAULT FALSE,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_inbox_processed ON inbox_messages(is_processed, received_at);
    "#),
    ("outbox_messages", r#"
        CREATE TABLE IF NOT EXISTS outbox_messages (
            id UUID PRIMARY KEY,
            document_type TEXT NOT NULL,
            business_process TEXT NOT NULL,
            sender_id TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            payload JSONB NOT NULL,
            is_sent BOOLEAN NOT NULL DEFAULT FALSE,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            scheduled_for TIMESTAMPTZ NOT NULL,
            response JSONB
        );
        CREATE INDEX IF NOT EXISTS idx_outbox_sent ON outbox_messages(is_sent, scheduled_for);
    "#),
];

/// Applies every table/index definition in dependency order. Safe to call
/// on every process start — each statement is already idempotent.
#[instrument(skip(pool))]
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    info!("applying settlement store schema");
    for (name, sql) in TABLES {
        debug!(table = name, "applying schema statement");
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .with_context(|| format!("failed to apply schema statement: {name}"))?;
    }
    info!("schema up to date");
    Ok(())
}
