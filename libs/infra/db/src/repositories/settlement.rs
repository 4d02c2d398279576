//! Settlements, their lines, and the issues raised when calculation is
//! blocked. Owns the `document_number` sequence (§6): allocation happens
//! before the pure calculator runs, since the calculator itself is not
//! allowed to touch the database.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use settlement_core_money::{Amount, Quantity, UnitPrice};
use settlement_domain_models::{
    Period, Settlement, SettlementIssue, SettlementIssueKind, SettlementLine, SettlementLineSource,
    SettlementStatus,
};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

mod queries {
    pub const NEXT_DOCUMENT_SEQUENCE_VALUE: &str = "SELECT nextval('document_number_seq')";
    pub const INSERT_SETTLEMENT: &str = r#"
        INSERT INTO settlements
            (id, metering_point_id, supply_id, period_start, period_end, time_series_id, time_series_version,
             total_energy, total_amount, status, is_correction, previous_settlement_id, invoice_reference,
             invoiced_at, document_number, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
    "#;
    pub const INSERT_LINE: &str = r#"
        INSERT INTO settlement_lines (id, settlement_id, description, source, quantity, unit_price, amount)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#;
    pub const FIND_BY_ID: &str = "SELECT * FROM settlements WHERE id = $1";
    pub const LINES_FOR_SETTLEMENT: &str = "SELECT * FROM settlement_lines WHERE settlement_id = $1";
    pub const FIND_INVOICED_OR_MIGRATED_FOR_PERIOD: &str = r#"
        SELECT * FROM settlements
        WHERE metering_point_id = $1 AND period_start = $2 AND period_end IS NOT DISTINCT FROM $3
          AND status IN ('invoiced', 'migrated')
    "#;
    pub const MARK_ADJUSTED: &str = "UPDATE settlements SET status = 'adjusted' WHERE id = $1";
    pub const MARK_INVOICED: &str =
        "UPDATE settlements SET status = 'invoiced', invoice_reference = $2, invoiced_at = $3 WHERE id = $1";
    pub const BY_STATUS: &str = "SELECT * FROM settlements WHERE status = $1 ORDER BY created_at";
    pub const CORRECTIONS: &str = "SELECT * FROM settlements WHERE is_correction = TRUE ORDER BY created_at";
    pub const UPSERT_ISSUE: &str = r#"
        INSERT INTO settlement_issues (id, metering_point_id, time_series_id, time_series_version, kind, status, detail, created_at, resolved_at)
        VALUES ($1, $2, $3, $4, $5, 'open', $6, $7, NULL)
        ON CONFLICT (metering_point_id, time_series_id, time_series_version) WHERE status = 'open'
        DO UPDATE SET kind = EXCLUDED.kind, detail = EXCLUDED.detail
    "#;
    pub const RESOLVE_OPEN_ISSUES: &str = r#"
        UPDATE settlement_issues SET status = 'resolved', resolved_at = $3
        WHERE metering_point_id = $1 AND time_series_id = $2 AND status = 'open'
    "#;
}

pub struct SettlementRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SettlementRow {
    id: Uuid,
    metering_point_id: Uuid,
    supply_id: Uuid,
    period_start: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
    time_series_id: Uuid,
    time_series_version: i32,
    total_energy: Decimal,
    total_amount: Decimal,
    status: String,
    is_correction: bool,
    previous_settlement_id: Option<Uuid>,
    invoice_reference: Option<String>,
    invoiced_at: Option<DateTime<Utc>>,
    document_number: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SettlementLineRow {
    id: Uuid,
    settlement_id: Uuid,
    description: String,
    source: String,
    quantity: Decimal,
    unit_price: Decimal,
    amount: Decimal,
}

impl SettlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Draws the next value from the monotonic `document_number_seq` and
    /// formats it `WO-YYYY-NNNNN`, per §6. Must be called before the
    /// calculator runs, since the number becomes part of its input.
    #[instrument(skip(self))]
    pub async fn allocate_document_number(&self, year: i32) -> Result<String, DbError> {
        let (next,): (i64,) = sqlx::query_as(queries::NEXT_DOCUMENT_SEQUENCE_VALUE)
            .fetch_one(&self.pool)
            .await?;
        Ok(format!("WO-{year}-{next:05}"))
    }

    #[instrument(skip(self, settlement))]
    pub async fn insert(&self, settlement: &Settlement) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(queries::INSERT_SETTLEMENT)
            .bind(settlement.id)
            .bind(settlement.metering_point_id)
            .bind(settlement.supply_id)
            .bind(settlement.period.start)
            .bind(settlement.period.end)
            .bind(settlement.time_series_id)
            .bind(settlement.time_series_version)
            .bind(settlement.total_energy.value())
            .bind(settlement.total_amount.value())
            .bind(status_str(settlement.status))
            .bind(settlement.is_correction)
            .bind(settlement.previous_settlement_id)
            .bind(&settlement.invoice_reference)
            .bind(settlement.invoiced_at)
            .bind(&settlement.document_number)
            .bind(settlement.created_at)
            .execute(&mut *tx)
            .await?;
        for line in &settlement.lines {
            sqlx::query(queries::INSERT_LINE)
                .bind(line.id)
                .bind(line.settlement_id)
                .bind(&line.description)
                .bind(source_str(line.source))
                .bind(line.quantity.value())
                .bind(line.unit_price.value())
                .bind(line.amount.value())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Settlement>, DbError> {
        let row: Option<SettlementRow> = sqlx::query_as(queries::FIND_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let lines = self.lines_for(row.id).await?;
        Ok(Some(Self::map_settlement(row, lines)?))
    }

    #[instrument(skip(self))]
    pub async fn lines_for(&self, settlement_id: Uuid) -> Result<Vec<SettlementLine>, DbError> {
        let rows: Vec<SettlementLineRow> = sqlx::query_as(queries::LINES_FOR_SETTLEMENT)
            .bind(settlement_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::map_line).collect()
    }

    /// §4.6e: the prior invoiced/migrated predecessor that a correction
    /// targets for the same `(metering_point, period)`.
    #[instrument(skip(self))]
    pub async fn find_invoiced_or_migrated_for_period(&self, metering_point_id: Uuid, period: &Period) -> Result<Option<Settlement>, DbError> {
        let row: Option<SettlementRow> = sqlx::query_as(queries::FIND_INVOICED_OR_MIGRATED_FOR_PERIOD)
            .bind(metering_point_id)
            .bind(period.start)
            .bind(period.end)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let lines = self.lines_for(row.id).await?;
        Ok(Some(Self::map_settlement(row, lines)?))
    }

    #[instrument(skip(self))]
    pub async fn mark_adjusted(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query(queries::MARK_ADJUSTED).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Enforced at the API layer by loading, calling `Settlement::mark_invoiced`
    /// (which rejects a non-`Calculated` start state) and persisting the result;
    /// this statement just writes the already-validated new state.
    #[instrument(skip(self))]
    pub async fn mark_invoiced(&self, id: Uuid, invoice_reference: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        sqlx::query(queries::MARK_INVOICED)
            .bind(id)
            .bind(invoice_reference)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn by_status(&self, status: SettlementStatus) -> Result<Vec<Settlement>, DbError> {
        let rows: Vec<SettlementRow> = sqlx::query_as(queries::BY_STATUS)
            .bind(status_str(status))
            .fetch_all(&self.pool)
            .await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.lines_for(row.id).await?;
            result.push(Self::map_settlement(row, lines)?);
        }
        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn corrections(&self) -> Result<Vec<Settlement>, DbError> {
        let rows: Vec<SettlementRow> = sqlx::query_as(queries::CORRECTIONS).fetch_all(&self.pool).await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.lines_for(row.id).await?;
            result.push(Self::map_settlement(row, lines)?);
        }
        Ok(result)
    }

    /// Dedup key is `(metering_point, time_series, version)` restricted to
    /// `status = 'open'` rows, enforced by a partial unique index — a
    /// re-raised issue for the same slot updates the existing open row
    /// instead of creating a second one.
    #[instrument(skip(self, issue))]
    pub async fn upsert_issue(&self, issue: &SettlementIssue) -> Result<(), DbError> {
        sqlx::query(queries::UPSERT_ISSUE)
            .bind(issue.id)
            .bind(issue.metering_point_id)
            .bind(issue.time_series_id)
            .bind(issue.time_series_version)
            .bind(issue_kind_str(issue.kind))
            .bind(&issue.detail)
            .bind(issue.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn resolve_open_issues(&self, metering_point_id: Uuid, time_series_id: Uuid, at: DateTime<Utc>) -> Result<(), DbError> {
        sqlx::query(queries::RESOLVE_OPEN_ISSUES)
            .bind(metering_point_id)
            .bind(time_series_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn map_settlement(row: SettlementRow, lines: Vec<SettlementLine>) -> Result<Settlement, DbError> {
        Ok(Settlement {
            id: row.id,
            metering_point_id: row.metering_point_id,
            supply_id: row.supply_id,
            period: Period::new(row.period_start, row.period_end),
            time_series_id: row.time_series_id,
            time_series_version: row.time_series_version,
            total_energy: Quantity::new(row.total_energy),
            total_amount: Amount::new(row.total_amount),
            status: parse_status(&row.status)?,
            is_correction: row.is_correction,
            previous_settlement_id: row.previous_settlement_id,
            invoice_reference: row.invoice_reference,
            invoiced_at: row.invoiced_at,
            document_number: row.document_number,
            created_at: row.created_at,
            lines,
        })
    }

    fn map_line(row: SettlementLineRow) -> Result<SettlementLine, DbError> {
        Ok(SettlementLine {
            id: row.id,
            settlement_id: row.settlement_id,
            description: row.description,
            source: parse_source(&row.source)?,
            quantity: Quantity::new(row.quantity),
            unit_price: UnitPrice::new(row.unit_price),
            amount: Amount::new(row.amount),
        })
    }
}

fn status_str(s: SettlementStatus) -> &'static str {
    match s {
        SettlementStatus::Calculated => "calculated",
        SettlementStatus::Invoiced => "invoiced",
        SettlementStatus::Adjusted => "adjusted",
        SettlementStatus::Migrated => "migrated",
    }
}

fn parse_status(s: &str) -> Result<SettlementStatus, DbError> {
    match s {
        "calculated" => Ok(SettlementStatus::Calculated),
        "invoiced" => Ok(SettlementStatus::Invoiced),
        "adjusted" => Ok(SettlementStatus::Adjusted),
        "migrated" => Ok(SettlementStatus::Migrated),
        other => Err(DbError::MappingError(format!("unknown settlement status: {other}"))),
    }
}

fn source_str(s: SettlementLineSource) -> &'static str {
    match s {
        SettlementLineSource::Tariff => "tariff",
        SettlementLineSource::Spot => "spot",
        SettlementLineSource::SupplierMargin => "supplier_margin",
        SettlementLineSource::Subscription => "subscription",
        SettlementLineSource::Fee => "fee",
    }
}

fn parse_source(s: &str) -> Result<SettlementLineSource, DbError> {
    match s {
        "tariff" => Ok(SettlementLineSource::Tariff),
        "spot" => Ok(SettlementLineSource::Spot),
        "supplier_margin" => Ok(SettlementLineSource::SupplierMargin),
        "subscription" => Ok(SettlementLineSource::Subscription),
        "fee" => Ok(SettlementLineSource::Fee),
        other => Err(DbError::MappingError(format!("unknown settlement line source: {other}"))),
    }
}

fn issue_kind_str(k: SettlementIssueKind) -> &'static str {
    match k {
        SettlementIssueKind::MissingPriceElements => "missing_price_elements",
        SettlementIssueKind::PriceCoverageGap => "price_coverage_gap",
    }
}
