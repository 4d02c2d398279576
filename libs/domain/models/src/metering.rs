//! Metering points and the supply periods that link them to customers.

use crate::period::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_core_identifiers::Gsrn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeteringPointType {
    Consumption,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeteringPointCategory {
    Physical,
    Virtual,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMethod {
    Hourly,
    Flex,
    Profiled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Hour,
    QuarterHour,
}

impl Resolution {
    pub fn step(&self) -> chrono::Duration {
        match self {
            Resolution::Hour => chrono::Duration::hours(1),
            Resolution::QuarterHour => chrono::Duration::minutes(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    New,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub street_name: Option<String>,
    pub building_number: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeteringPoint {
    pub id: Uuid,
    pub gsrn: Gsrn,
    pub metering_point_type: MeteringPointType,
    pub category: MeteringPointCategory,
    pub settlement_method: SettlementMethod,
    pub resolution: Resolution,
    pub connection_state: ConnectionState,
    pub grid_area_code: String,
    pub grid_company_id: String,
    pub address: Option<Address>,
    pub has_active_supply: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MeteringPoint {
    /// Idempotent partial update applied by the BRS-006 master-data handler:
    /// only the fields present in the payload are touched.
    pub fn apply_master_data_update(&mut self, update: MeteringPointUpdate) {
        if let Some(connection_state) = update.connection_state {
            self.connection_state = connection_state;
        }
        if let Some(grid_area_code) = update.grid_area_code {
            self.grid_area_code = grid_area_code;
        }
        if let Some(grid_company_id) = update.grid_company_id {
            self.grid_company_id = grid_company_id;
        }
        if let Some(address) = update.address {
            self.address = Some(address);
        }
        if let Some(resolution) = update.resolution {
            self.resolution = resolution;
        }
        self.updated_at = Some(Utc::now());
    }
}

/// Partial-update payload extracted from a BRS-006 message; every field is
/// optional because the wire message only carries what changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeteringPointUpdate {
    pub connection_state: Option<ConnectionState>,
    pub grid_area_code: Option<String>,
    pub grid_company_id: Option<String>,
    pub address: Option<Address>,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supply {
    pub id: Uuid,
    pub metering_point_id: Uuid,
    pub customer_id: Uuid,
    pub period: Period,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Supply {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.period.contains(at)
    }
}
