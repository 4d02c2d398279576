//! Commercial products, the periods a supply holds them for, and the
//! stepwise supplier-margin schedule that prices the energy line.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use settlement_core_money::UnitPrice;
use settlement_domain_models::{
    Period, PricingModel, SupplierMarginSchedule, SupplierMarginStep, SupplierProduct, SupplyProductPeriod,
};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

mod queries {
    pub const FIND_PRODUCT_BY_ID: &str = "SELECT * FROM supplier_products WHERE id = $1";
    pub const ACTIVE_PRODUCT_PERIOD_AT: &str = r#"
        SELECT * FROM supply_product_periods
        WHERE supply_id = $1 AND period_start <= $2 AND (period_end IS NULL OR period_end > $2)
    "#;
    pub const MARGIN_STEPS_FOR_PRODUCT: &str =
        "SELECT * FROM supplier_margin_steps WHERE product_id = $1 ORDER BY valid_from";
}

pub struct ProductRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    pricing_model: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct SupplyProductPeriodRow {
    id: Uuid,
    supply_id: Uuid,
    product_id: Uuid,
    period_start: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MarginStepRow {
    id: Uuid,
    product_id: Uuid,
    valid_from: DateTime<Utc>,
    rate: Decimal,
    created_at: DateTime<Utc>,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SupplierProduct>, DbError> {
        let row: Option<ProductRow> = sqlx::query_as(queries::FIND_PRODUCT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::map_product).transpose()
    }

    #[instrument(skip(self))]
    pub async fn active_product_period_at(
        &self,
        supply_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<SupplyProductPeriod>, DbError> {
        let row: Option<SupplyProductPeriodRow> = sqlx::query_as(queries::ACTIVE_PRODUCT_PERIOD_AT)
            .bind(supply_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::map_product_period))
    }

    #[instrument(skip(self))]
    pub async fn margin_schedule_for_product(&self, product_id: Uuid) -> Result<SupplierMarginSchedule, DbError> {
        let rows: Vec<MarginStepRow> = sqlx::query_as(queries::MARGIN_STEPS_FOR_PRODUCT)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        let steps = rows.into_iter().map(Self::map_margin_step).collect::<Result<Vec<_>, _>>()?;
        Ok(SupplierMarginSchedule::new(steps))
    }

    fn map_product(row: ProductRow) -> Result<SupplierProduct, DbError> {
        Ok(SupplierProduct {
            id: row.id,
            name: row.name,
            pricing_model: parse_pricing_model(&row.pricing_model)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn map_product_period(row: SupplyProductPeriodRow) -> SupplyProductPeriod {
        SupplyProductPeriod {
            id: row.id,
            supply_id: row.supply_id,
            product_id: row.product_id,
            period: Period::new(row.period_start, row.period_end),
            created_at: row.created_at,
        }
    }

    fn map_margin_step(row: MarginStepRow) -> Result<SupplierMarginStep, DbError> {
        Ok(SupplierMarginStep {
            id: row.id,
            product_id: row.product_id,
            valid_from: row.valid_from,
            rate: UnitPrice::new(row.rate),
            created_at: row.created_at,
        })
    }
}

fn parse_pricing_model(s: &str) -> Result<PricingModel, DbError> {
    match s {
        "spot_addon" => Ok(PricingModel::SpotAddon),
        "fixed" => Ok(PricingModel::Fixed),
        other => Err(DbError::MappingError(format!("unknown pricing_model: {other}"))),
    }
}
