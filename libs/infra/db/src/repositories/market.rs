//! Grid-area aggregates, wholesale settlement amounts, and spot prices
//! delivered by the market operator. All three are append-only.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use settlement_core_money::UnitPrice;
use settlement_domain_models::{AggregatedTimeSeries, Period, SpotPrice, SpotPriceSeries, WholesaleSettlement};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

mod queries {
    pub const INSERT_AGGREGATED: &str = r#"
        INSERT INTO aggregated_time_series (id, grid_area_code, period_start, period_end, quantity, received_at)
        VALUES ($1, $2, $3, $4, $5, $6)
    "#;
    pub const INSERT_WHOLESALE: &str = r#"
        INSERT INTO wholesale_settlements (id, grid_area_code, grid_company_id, period_start, period_end, amount, received_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#;
    pub const UPSERT_SPOT_PRICE: &str = r#"
        INSERT INTO spot_prices (id, bidding_area, timestamp, rate, received_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (bidding_area, timestamp) DO UPDATE SET rate = EXCLUDED.rate, received_at = EXCLUDED.received_at
    "#;
    pub const SPOT_PRICES_FOR_PERIOD: &str =
        "SELECT * FROM spot_prices WHERE bidding_area = $1 AND timestamp >= $2 AND timestamp < $3 ORDER BY timestamp";
}

pub struct MarketRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SpotPriceRow {
    id: Uuid,
    bidding_area: String,
    timestamp: DateTime<Utc>,
    rate: Decimal,
    received_at: DateTime<Utc>,
}

impl MarketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, aggregated))]
    pub async fn insert_aggregated(&self, aggregated: &AggregatedTimeSeries) -> Result<(), DbError> {
        sqlx::query(queries::INSERT_AGGREGATED)
            .bind(aggregated.id)
            .bind(&aggregated.grid_area_code)
            .bind(aggregated.period.start)
            .bind(aggregated.period.end)
            .bind(aggregated.quantity.value())
            .bind(aggregated.received_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, settlement))]
    pub async fn insert_wholesale(&self, settlement: &WholesaleSettlement) -> Result<(), DbError> {
        sqlx::query(queries::INSERT_WHOLESALE)
            .bind(settlement.id)
            .bind(&settlement.grid_area_code)
            .bind(&settlement.grid_company_id)
            .bind(settlement.period.start)
            .bind(settlement.period.end)
            .bind(settlement.amount.value())
            .bind(settlement.received_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Idempotent by `(bidding_area, timestamp)` — a re-fetched day-ahead
    /// price simply overwrites the rate already on file.
    #[instrument(skip(self, spot_price))]
    pub async fn upsert_spot_price(&self, spot_price: &SpotPrice) -> Result<(), DbError> {
        sqlx::query(queries::UPSERT_SPOT_PRICE)
            .bind(spot_price.id)
            .bind(&spot_price.bidding_area)
            .bind(spot_price.timestamp)
            .bind(spot_price.rate.value())
            .bind(spot_price.received_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn spot_prices_for_period(&self, bidding_area: &str, period: &Period) -> Result<SpotPriceSeries, DbError> {
        let end = period.end.unwrap_or(DateTime::<Utc>::MAX_UTC);
        let rows: Vec<SpotPriceRow> = sqlx::query_as(queries::SPOT_PRICES_FOR_PERIOD)
            .bind(bidding_area)
            .bind(period.start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(SpotPriceSeries::new(rows.into_iter().map(Self::map_spot_price).collect()))
    }

    fn map_spot_price(row: SpotPriceRow) -> SpotPrice {
        SpotPrice {
            id: row.id,
            bidding_area: row.bidding_area,
            timestamp: row.timestamp,
            rate: UnitPrice::new(row.rate),
            received_at: row.received_at,
        }
    }
}

