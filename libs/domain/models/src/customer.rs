//! Customers and the supplier identities that own them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_core_identifiers::{CustomerIdentity, GridParticipantId};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub supplier_identity_id: Uuid,
    pub number: CustomerIdentity,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierIdentityState {
    Active,
    Legacy,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierIdentity {
    pub id: Uuid,
    pub grid_participant_id: GridParticipantId,
    pub name: String,
    pub state: SupplierIdentityState,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SupplierIdentity {
    /// Legacy identities may still originate corrections; anything else
    /// that isn't `Active` must not receive new business.
    pub fn accepts_new_business(&self) -> bool {
        matches!(self.state, SupplierIdentityState::Active)
    }
}
