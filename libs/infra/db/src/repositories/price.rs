//! DataHub charges, their time-varying rates, and the links binding them to
//! metering points.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use settlement_core_money::UnitPrice;
use settlement_domain_models::{
    Period, Price, PriceCategory, PriceLink, PricePoint, PricePointSeries, PriceType, Resolution,
};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

mod queries {
    pub const FIND_BY_CHARGE_AND_OWNER: &str = "SELECT * FROM prices WHERE charge_id = $1 AND owner_gln = $2";
    pub const FIND_BY_ID: &str = "SELECT * FROM prices WHERE id = $1";
    pub const INSERT_PRICE: &str = r#"
        INSERT INTO prices
            (id, charge_id, owner_gln, price_type, category, description, period_start, period_end,
             is_vat_exempt, is_tax, is_pass_through, resolution, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
    "#;
    pub const UPDATE_PRICE: &str = r#"
        UPDATE prices SET
            category = $2, description = $3, period_start = $4, period_end = $5,
            is_vat_exempt = $6, is_tax = $7, updated_at = $8
        WHERE id = $1
    "#;
    pub const DELETE_POINTS_IN_RANGE: &str =
        "DELETE FROM price_points WHERE price_id = $1 AND timestamp >= $2 AND timestamp < $3";
    pub const INSERT_POINT: &str =
        "INSERT INTO price_points (id, price_id, timestamp, rate, created_at) VALUES ($1, $2, $3, $4, $5)";
    pub const POINTS_FOR_PRICE: &str = "SELECT * FROM price_points WHERE price_id = $1 ORDER BY timestamp";
    pub const ACTIVE_PRICE_LINKS_FOR_METERING_POINT: &str = r#"
        SELECT * FROM price_links
        WHERE metering_point_id = $1 AND period_start <= $2 AND (period_end IS NULL OR period_end > $2)
    "#;
    pub const FIND_LINK: &str = "SELECT * FROM price_links WHERE price_id = $1 AND metering_point_id = $2";
    pub const INSERT_LINK: &str = r#"
        INSERT INTO price_links (id, price_id, metering_point_id, period_start, period_end, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#;
    pub const UPDATE_LINK: &str =
        "UPDATE price_links SET period_start = $2, period_end = $3, updated_at = $4 WHERE id = $1";
}

pub struct PriceRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct PriceRow {
    id: Uuid,
    charge_id: String,
    owner_gln: String,
    price_type: String,
    category: String,
    description: String,
    period_start: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
    is_vat_exempt: bool,
    is_tax: bool,
    is_pass_through: bool,
    resolution: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct PricePointRow {
    id: Uuid,
    price_id: Uuid,
    timestamp: DateTime<Utc>,
    rate: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PriceLinkRow {
    id: Uuid,
    price_id: Uuid,
    metering_point_id: Uuid,
    period_start: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl PriceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_by_charge_and_owner(&self, charge_id: &str, owner_gln: &str) -> Result<Option<Price>, DbError> {
        let row: Option<PriceRow> = sqlx::query_as(queries::FIND_BY_CHARGE_AND_OWNER)
            .bind(charge_id)
            .bind(owner_gln)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::map_price).transpose()
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Price>, DbError> {
        let row: Option<PriceRow> = sqlx::query_as(queries::FIND_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::map_price).transpose()
    }

    #[instrument(skip(self, price))]
    pub async fn insert_price(&self, price: &Price) -> Result<(), DbError> {
        sqlx::query(queries::INSERT_PRICE)
            .bind(price.id)
            .bind(&price.charge_id)
            .bind(&price.owner_gln)
            .bind(price_type_str(price.price_type))
            .bind(category_str(price.category))
            .bind(&price.description)
            .bind(price.period.start)
            .bind(price.period.end)
            .bind(price.is_vat_exempt)
            .bind(price.is_tax)
            .bind(price.is_pass_through)
            .bind(price.resolution.map(resolution_str))
            .bind(price.created_at)
            .bind(price.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, price))]
    pub async fn update_price(&self, price: &Price) -> Result<(), DbError> {
        sqlx::query(queries::UPDATE_PRICE)
            .bind(price.id)
            .bind(category_str(price.category))
            .bind(&price.description)
            .bind(price.period.start)
            .bind(price.period.end)
            .bind(price.is_vat_exempt)
            .bind(price.is_tax)
            .bind(price.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// §4.3 (D08): atomically replaces every point in `[period.start, period.end)`.
    #[instrument(skip(self, points))]
    pub async fn replace_points_in_range(&self, price_id: Uuid, period: &Period, points: &[PricePoint]) -> Result<(), DbError> {
        let end = period.end.unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut tx = self.pool.begin().await?;
        sqlx::query(queries::DELETE_POINTS_IN_RANGE)
            .bind(price_id)
            .bind(period.start)
            .bind(end)
            .execute(&mut *tx)
            .await?;
        for point in points {
            sqlx::query(queries::INSERT_POINT)
                .bind(point.id)
                .bind(point.price_id)
                .bind(point.timestamp)
                .bind(point.rate.value())
                .bind(point.created_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn points_for_price(&self, price_id: Uuid) -> Result<PricePointSeries, DbError> {
        let rows: Vec<PricePointRow> = sqlx::query_as(queries::POINTS_FOR_PRICE)
            .bind(price_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(PricePointSeries::new(rows.into_iter().map(Self::map_point).collect()))
    }

    #[instrument(skip(self))]
    pub async fn active_links_for_metering_point(&self, metering_point_id: Uuid, at: DateTime<Utc>) -> Result<Vec<PriceLink>, DbError> {
        let rows: Vec<PriceLinkRow> = sqlx::query_as(queries::ACTIVE_PRICE_LINKS_FOR_METERING_POINT)
            .bind(metering_point_id)
            .bind(at)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Self::map_link).collect())
    }

    #[instrument(skip(self))]
    pub async fn find_link(&self, price_id: Uuid, metering_point_id: Uuid) -> Result<Option<PriceLink>, DbError> {
        let row: Option<PriceLinkRow> = sqlx::query_as(queries::FIND_LINK)
            .bind(price_id)
            .bind(metering_point_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::map_link))
    }

    #[instrument(skip(self, link))]
    pub async fn insert_link(&self, link: &PriceLink) -> Result<(), DbError> {
        sqlx::query(queries::INSERT_LINK)
            .bind(link.id)
            .bind(link.price_id)
            .bind(link.metering_point_id)
            .bind(link.period.start)
            .bind(link.period.end)
            .bind(link.created_at)
            .bind(link.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, link))]
    pub async fn update_link(&self, link: &PriceLink) -> Result<(), DbError> {
        sqlx::query(queries::UPDATE_LINK)
            .bind(link.id)
            .bind(link.period.start)
            .bind(link.period.end)
            .bind(link.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn map_price(row: PriceRow) -> Result<Price, DbError> {
        Ok(Price {
            id: row.id,
            charge_id: row.charge_id,
            owner_gln: row.owner_gln,
            price_type: parse_price_type(&row.price_type)?,
            category: parse_category(&row.category)?,
            description: row.description,
            period: Period::new(row.period_start, row.period_end),
            is_vat_exempt: row.is_vat_exempt,
            is_tax: row.is_tax,
            is_pass_through: row.is_pass_through,
            resolution: row.resolution.as_deref().map(parse_resolution).transpose()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn map_point(row: PricePointRow) -> PricePoint {
        PricePoint {
            id: row.id,
            price_id: row.price_id,
            timestamp: row.timestamp,
            rate: UnitPrice::new(row.rate),
            created_at: row.created_at,
        }
    }

    fn map_link(row: PriceLinkRow) -> PriceLink {
        PriceLink {
            id: row.id,
            price_id: row.price_id,
            metering_point_id: row.metering_point_id,
            period: Period::new(row.period_start, row.period_end),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn price_type_str(t: PriceType) -> &'static str {
    match t {
        PriceType::Tariff => "tariff",
        PriceType::Subscription => "subscription",
        PriceType::Fee => "fee",
    }
}

fn parse_price_type(s: &str) -> Result<PriceType, DbError> {
    match s {
        "tariff" => Ok(PriceType::Tariff),
        "subscription" => Ok(PriceType::Subscription),
        "fee" => Ok(PriceType::Fee),
        other => Err(DbError::MappingError(format!("unknown price_type: {other}"))),
    }
}

fn category_str(c: PriceCategory) -> &'static str {
    match c {
        PriceCategory::NetTariff => "nettariff",
        PriceCategory::System => "system",
        PriceCategory::Transmission => "transmission",
        PriceCategory::Tax => "tax",
        PriceCategory::Spot => "spot",
        PriceCategory::Margin => "margin",
        PriceCategory::Other => "other",
    }
}

fn parse_category(s: &str) -> Result<PriceCategory, DbError> {
    match s {
        "nettariff" => Ok(PriceCategory::NetTariff),
        "system" => Ok(PriceCategory::System),
        "transmission" => Ok(PriceCategory::Transmission),
        "tax" => Ok(PriceCategory::Tax),
        "spot" => Ok(PriceCategory::Spot),
        "margin" => Ok(PriceCategory::Margin),
        "other" => Ok(PriceCategory::Other),
        other => Err(DbError::MappingError(format!("unknown price category: {other}"))),
    }
}

fn resolution_str(r: Resolution) -> &'static str {
    match r {
        Resolution::Hour => "hour",
        Resolution::QuarterHour => "quarter_hour",
    }
}

fn parse_resolution(s: &str) -> Result<Resolution, DbError> {
    match s {
        "hour" => Ok(Resolution::Hour),
        "quarter_hour" => Ok(Resolution::QuarterHour),
        other => Err(DbError::MappingError(format!("unknown resolution: {other}"))),
    }
}
