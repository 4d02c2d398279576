//! Metering points and the supply periods that link them to customers.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use settlement_core_identifiers::Gsrn;
use settlement_domain_models::{
    Address, ConnectionState, MeteringPoint, MeteringPointCategory, MeteringPointType, Period,
    Resolution, SettlementMethod, Supply,
};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

mod queries {
    pub const FIND_BY_GSRN: &str = "SELECT * FROM metering_points WHERE gsrn = $1";
    pub const FIND_BY_ID: &str = "SELECT * FROM metering_points WHERE id = $1";
    pub const INSERT: &str = r#"
        INSERT INTO metering_points
            (id, gsrn, metering_point_type, category, settlement_method, resolution,
             connection_state, grid_area_code, grid_company_id, address_json,
             has_active_supply, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
    "#;
    pub const UPDATE: &str = r#"
        UPDATE metering_points SET
            connection_state = $2, grid_area_code = $3, grid_company_id = $4,
            address_json = $5, resolution = $6, has_active_supply = $7, updated_at = $8
        WHERE id = $1
    "#;
    pub const ACTIVE_SUPPLY_AT: &str = r#"
        SELECT * FROM supplies
        WHERE metering_point_id = $1 AND period_start <= $2 AND (period_end IS NULL OR period_end > $2)
    "#;
    pub const INSERT_SUPPLY: &str = r#"
        INSERT INTO supplies (id, metering_point_id, customer_id, period_start, period_end, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#;
}

pub struct MeteringRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct MeteringPointRow {
    id: Uuid,
    gsrn: String,
    metering_point_type: String,
    category: String,
    settlement_method: String,
    resolution: String,
    connection_state: String,
    grid_area_code: String,
    grid_company_id: String,
    address_json: Option<serde_json::Value>,
    has_active_supply: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct SupplyRow {
    id: Uuid,
    metering_point_id: Uuid,
    customer_id: Uuid,
    period_start: DateTime<Utc>,
    period_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl MeteringRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_by_gsrn(&self, gsrn: &Gsrn) -> Result<Option<MeteringPoint>, DbError> {
        let row: Option<MeteringPointRow> = sqlx::query_as(queries::FIND_BY_GSRN)
            .bind(gsrn.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::map_metering_point).transpose()
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MeteringPoint>, DbError> {
        let row: Option<MeteringPointRow> = sqlx::query_as(queries::FIND_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::map_metering_point).transpose()
    }

    #[instrument(skip(self, metering_point))]
    pub async fn insert(&self, metering_point: &MeteringPoint) -> Result<(), DbError> {
        let address_json = metering_point
            .address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        sqlx::query(queries::INSERT)
            .bind(metering_point.id)
            .bind(metering_point.gsrn.as_str())
            .bind(metering_point_type_str(metering_point.metering_point_type))
            .bind(category_str(metering_point.category))
            .bind(settlement_method_str(metering_point.settlement_method))
            .bind(resolution_str(metering_point.resolution))
            .bind(connection_state_str(metering_point.connection_state))
            .bind(&metering_point.grid_area_code)
            .bind(&metering_point.grid_company_id)
            .bind(address_json)
            .bind(metering_point.has_active_supply)
            .bind(metering_point.created_at)
            .bind(metering_point.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, metering_point))]
    pub async fn update(&self, metering_point: &MeteringPoint) -> Result<(), DbError> {
        let address_json = metering_point
            .address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        sqlx::query(queries::UPDATE)
            .bind(metering_point.id)
            .bind(connection_state_str(metering_point.connection_state))
            .bind(&metering_point.grid_area_code)
            .bind(&metering_point.grid_company_id)
            .bind(address_json)
            .bind(resolution_str(metering_point.resolution))
            .bind(metering_point.has_active_supply)
            .bind(metering_point.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn active_supply_at(&self, metering_point_id: Uuid, at: DateTime<Utc>) -> Result<Option<Supply>, DbError> {
        let row: Option<SupplyRow> = sqlx::query_as(queries::ACTIVE_SUPPLY_AT)
            .bind(metering_point_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Self::map_supply))
    }

    #[instrument(skip(self, supply))]
    pub async fn insert_supply(&self, supply: &Supply) -> Result<(), DbError> {
        sqlx::query(queries::INSERT_SUPPLY)
            .bind(supply.id)
            .bind(supply.metering_point_id)
            .bind(supply.customer_id)
            .bind(supply.period.start)
            .bind(supply.period.end)
            .bind(supply.created_at)
            .bind(supply.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn map_metering_point(row: MeteringPointRow) -> Result<MeteringPoint, DbError> {
        Ok(MeteringPoint {
            id: row.id,
            gsrn: Gsrn::new(row.gsrn).map_err(|e| DbError::MappingError(e.to_string()))?,
            metering_point_type: parse_metering_point_type(&row.metering_point_type)?,
            category: parse_category(&row.category)?,
            settlement_method: parse_settlement_method(&row.settlement_method)?,
            resolution: parse_resolution(&row.resolution)?,
            connection_state: parse_connection_state(&row.connection_state)?,
            grid_area_code: row.grid_area_code,
            grid_company_id: row.grid_company_id,
            address: row
                .address_json
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            has_active_supply: row.has_active_supply,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn map_supply(row: SupplyRow) -> Supply {
        Supply {
            id: row.id,
            metering_point_id: row.metering_point_id,
            customer_id: row.customer_id,
            period: Period::new(row.period_start, row.period_end),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn metering_point_type_str(t: MeteringPointType) -> &'static str {
    match t {
        MeteringPointType::Consumption => "consumption",
        MeteringPointType::Production => "production",
    }
}

fn parse_metering_point_type(s: &str) -> Result<MeteringPointType, DbError> {
    match s {
        "consumption" => Ok(MeteringPointType::Consumption),
        "production" => Ok(MeteringPointType::Production),
        other => Err(DbError::MappingError(format!("unknown metering_point_type: {other}"))),
    }
}

fn category_str(c: MeteringPointCategory) -> &'static str {
    match c {
        MeteringPointCategory::Physical => "physical",
        MeteringPointCategory::Virtual => "virtual",
        MeteringPointCategory::Child => "child",
    }
}

fn parse_category(s: &str) -> Result<MeteringPointCategory, DbError> {
    match s {
        "physical" => Ok(MeteringPointCategory::Physical),
        "virtual" => Ok(MeteringPointCategory::Virtual),
        "child" => Ok(MeteringPointCategory::Child),
        other => Err(DbError::MappingError(format!("unknown category: {other}"))),
    }
}

fn settlement_method_str(m: SettlementMethod) -> &'static str {
    match m {
        SettlementMethod::Hourly => "hourly",
        SettlementMethod::Flex => "flex",
        SettlementMethod::Profiled => "profiled",
    }
}

fn parse_settlement_method(s: &str) -> Result<SettlementMethod, DbError> {
    match s {
        "hourly" => Ok(SettlementMethod::Hourly),
        "flex" => Ok(SettlementMethod::Flex),
        "profiled" => Ok(SettlementMethod::Profiled),
        other => Err(DbError::MappingError(format!("unknown settlement_method: {other}"))),
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

fn connection_state_str(c: ConnectionState) -> &'static str {
    match c {
        ConnectionState::New => "new",
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnected => "disconnected",
    }
}

fn parse_connection_state(s: &str) -> Result<ConnectionState, DbError> {
    match s {
        "new" => Ok(ConnectionState::New),
        "connected" => Ok(ConnectionState::Connected),
        "disconnected" => Ok(ConnectionState::Disconnected),
        other => Err(DbError::MappingError(format!("unknown connection_state: {other}"))),
    }
}
