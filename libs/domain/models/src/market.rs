//! Grid-area level aggregates and wholesale data received from the market:
//! aggregated consumption/production, wholesale settlement amounts, and spot
//! prices used to feed the spot-addon pricing model.

use crate::period::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_core_money::{Amount, Quantity, UnitPrice};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedTimeSeries {
    pub id: Uuid,
    pub grid_area_code: String,
    pub period: Period,
    pub quantity: Quantity,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WholesaleSettlement {
    pub id: Uuid,
    pub grid_area_code: String,
    pub grid_company_id: String,
    pub period: Period,
    pub amount: Amount,
    pub received_at: DateTime<Utc>,
}

/// Hourly spot price for a single bidding (grid) area, as published by the
/// market operator. One point per hour; §3's "greatest timestamp ≤ t" rule
/// applies the same as for [`crate::price::PricePoint`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotPrice {
    pub id: Uuid,
    pub bidding_area: String,
    pub timestamp: DateTime<Utc>,
    pub rate: UnitPrice,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SpotPriceSeries {
    points: Vec<SpotPrice>,
}

impl SpotPriceSeries {
    pub fn new(mut points: Vec<SpotPrice>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn rate_at(&self, t: DateTime<Utc>) -> Option<UnitPrice> {
        self.points
            .iter()
            .filter(|p| p.timestamp <= t)
            .max_by_key(|p| p.timestamp)
            .map(|p| p.rate)
    }

    /// Whether every tick in `period` (at the given resolution step) has a
    /// spot price on or before it — used by the validator to decide whether
    /// wholesale data is ready for settlement.
    pub fn covers(&self, period: &Period, step: chrono::Duration) -> bool {
        period.ticks(step).iter().all(|t| self.rate_at(*t).is_some())
    }
}
