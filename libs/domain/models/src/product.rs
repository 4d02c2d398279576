//! Commercial products, the periods a supply holds them for, and the
//! stepwise margin rate that funds the supplier's energy price.

use crate::period::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_core_money::UnitPrice;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    /// Wholesale spot price plus the supplier's margin.
    SpotAddon,
    /// The margin is the full energy price; spot is ignored.
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierProduct {
    pub id: Uuid,
    pub name: String,
    pub pricing_model: PricingModel,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyProductPeriod {
    pub id: Uuid,
    pub supply_id: Uuid,
    pub product_id: Uuid,
    pub period: Period,
    pub created_at: DateTime<Utc>,
}

/// One step of a supplier's stepwise margin-rate function for a product.
/// The rate in force at time `t` is the row with the greatest
/// `valid_from ≤ t`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierMarginStep {
    pub id: Uuid,
    pub product_id: Uuid,
    pub valid_from: DateTime<Utc>,
    pub rate: UnitPrice,
    pub created_at: DateTime<Utc>,
}

/// The full set of margin steps for a product, in no particular order;
/// callers resolve the effective rate with [`SupplierMarginSchedule::rate_at`].
#[derive(Debug, Clone, Default)]
pub struct SupplierMarginSchedule {
    steps: Vec<SupplierMarginStep>,
}

impl SupplierMarginSchedule {
    pub fn new(steps: Vec<SupplierMarginStep>) -> Self {
        Self { steps }
    }

    pub fn rate_at(&self, t: DateTime<Utc>) -> Option<UnitPrice> {
        self.steps
            .iter()
            .filter(|step| step.valid_from <= t)
            .max_by_key(|step| step.valid_from)
            .map(|step| step.rate)
    }

    /// The margin only needs to be *defined*, not covered at every interval
    /// tick — a single step with `valid_from ≤ period.start` suffices.
    pub fn is_defined_over(&self, period: &Period) -> bool {
        self.rate_at(period.start).is_some()
    }
}
