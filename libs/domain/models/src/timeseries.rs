//! Versioned, immutable metered time series and their observations.

use crate::period::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_core_money::Quantity;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Measured,
    Estimated,
    Revised,
    Incomplete,
}

impl Quality {
    /// Maps the CIM scheme codes carried on the wire to the domain enum:
    /// `A01→Measured`, `A02→Estimated`, `A03→Measured` (accepted),
    /// `A05→Revised`, `QM→Incomplete`. Unknown codes are rejected rather
    /// than silently mapped to a default.
    pub fn from_cim_code(code: &str) -> Option<Self> {
        match code {
            "A01" | "A03" => Some(Quality::Measured),
            "A02" => Some(Quality::Estimated),
            "A05" => Some(Quality::Revised),
            "QM" => Some(Quality::Incomplete),
            _ => None,
        }
    }

    pub fn is_usable(&self) -> bool {
        !matches!(self, Quality::Incomplete)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub quantity: Quantity,
    pub quality: Quality,
}

/// A single metered-data submission for one metering point and period.
/// Every new submission for the same metering point and period is stored
/// as a new row with an incremented [`TimeSeries::version`]; nothing is
/// ever mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub id: Uuid,
    pub metering_point_id: Uuid,
    pub period: Period,
    pub version: i32,
    pub is_latest: bool,
    pub received_at: DateTime<Utc>,
    pub observations: Vec<Observation>,
}

impl TimeSeries {
    /// §4.2 (BRS-021): a later submission for the same metering point and
    /// period always wins, regardless of its own internal quality.
    pub fn supersedes(&self, incumbent: &TimeSeries) -> bool {
        self.metering_point_id == incumbent.metering_point_id
            && self.period == incumbent.period
            && self.version > incumbent.version
    }

    /// Observations outside `[period.start, period.end)` are discarded per
    /// §8 and never contribute to the total.
    pub fn total_quantity(&self) -> Quantity {
        self.observations
            .iter()
            .filter(|o| self.period.contains(o.timestamp))
            .map(|o| o.quantity)
            .sum()
    }

    pub fn all_usable(&self) -> bool {
        self.observations.iter().all(|o| o.quality.is_usable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cim_quality_codes_map() {
        assert_eq!(Quality::from_cim_code("A01"), Some(Quality::Measured));
        assert_eq!(Quality::from_cim_code("A03"), Some(Quality::Measured));
        assert_eq!(Quality::from_cim_code("QM"), Some(Quality::Incomplete));
        assert_eq!(Quality::from_cim_code("bogus"), None);
    }

    #[test]
    fn only_incomplete_is_unusable() {
        assert!(!Quality::Incomplete.is_usable());
        assert!(Quality::Measured.is_usable());
        assert!(Quality::Estimated.is_usable());
        assert!(Quality::Revised.is_usable());
    }
}
