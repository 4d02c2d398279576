//! DataHub-side charges (tariffs, subscriptions, fees) and the time-varying
//! rates and metering-point links attached to them.

use crate::metering::Resolution;
use crate::period::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_core_money::UnitPrice;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Tariff,
    Subscription,
    Fee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceCategory {
    NetTariff,
    System,
    Transmission,
    Tax,
    Spot,
    Margin,
    Other,
}

impl PriceCategory {
    /// Categories whose rate varies hour-by-hour (or quarter-hour-by-quarter-hour)
    /// and must therefore be checked for [`Period`] coverage, as opposed to
    /// subscriptions and fees which carry a single flat value.
    pub fn is_time_varying(&self) -> bool {
        !matches!(self, PriceCategory::Other)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub id: Uuid,
    pub charge_id: String,
    pub owner_gln: String,
    pub price_type: PriceType,
    pub category: PriceCategory,
    pub description: String,
    pub period: Period,
    pub is_vat_exempt: bool,
    pub is_tax: bool,
    pub is_pass_through: bool,
    pub resolution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum PriceInvariantError {
    #[error("isTax=true is only valid for a Tariff price")]
    TaxOnNonTariff,
    #[error("fees are never pass-through")]
    FeePassThrough,
}

impl Price {
    /// Enforces the two structural invariants from §4.3 (D18): taxes are
    /// only valid on tariffs, and fees are never pass-through.
    pub fn validate_invariants(&self) -> Result<(), PriceInvariantError> {
        if self.is_tax && self.price_type != PriceType::Tariff {
            return Err(PriceInvariantError::TaxOnNonTariff);
        }
        if self.price_type == PriceType::Fee && self.is_pass_through {
            return Err(PriceInvariantError::FeePassThrough);
        }
        Ok(())
    }
}

/// A timestamped rate. Tariffs carry one point per resolution interval;
/// subscriptions carry exactly one point, the periodic amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub id: Uuid,
    pub price_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub rate: UnitPrice,
    pub created_at: DateTime<Utc>,
}

/// A set of price points for a single price, queryable by the "greatest
/// timestamp ≤ t" rule from §3.
#[derive(Debug, Clone, Default)]
pub struct PricePointSeries {
    points: Vec<PricePoint>,
}

impl PricePointSeries {
    pub fn new(mut points: Vec<PricePoint>) -> Self {
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

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether every tick in `period` (at the given resolution step) has a
    /// price point on or before it.
    pub fn covers(&self, period: &Period, step: chrono::Duration) -> bool {
        period.ticks(step).iter().all(|t| self.rate_at(*t).is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLink {
    pub id: Uuid,
    pub price_id: Uuid,
    pub metering_point_id: Uuid,
    pub period: Period,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
