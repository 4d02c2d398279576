//! Decides whether a settlement's required price inputs are present and
//! cover the settlement period, per §4.4.

use settlement_domain_models::{
    Period, Price, PriceCategory, PricePointSeries, PricingModel, Resolution, SpotPriceSeries,
    SupplierMarginSchedule,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingPriceElements(String),
    PriceCoverageGap(String),
}

/// Tariff categories every pricing model requires at least one active price
/// for, regardless of SpotAddon vs Fixed.
const REQUIRED_TARIFF_CATEGORIES: &[PriceCategory] = &[
    PriceCategory::NetTariff,
    PriceCategory::System,
    PriceCategory::Transmission,
    PriceCategory::Tax,
];

pub struct ValidationInput<'a> {
    pub pricing_model: PricingModel,
    pub period: Period,
    pub resolution: Resolution,
    pub active_prices: &'a [(Price, PricePointSeries)],
    pub spot_prices: &'a SpotPriceSeries,
    pub margin: &'a SupplierMarginSchedule,
}

/// Runs every check from §4.4 and returns the accumulated issue list; an
/// empty list means the settlement may proceed.
pub fn validate(input: &ValidationInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for category in REQUIRED_TARIFF_CATEGORIES {
        let present = input.active_prices.iter().any(|(price, _)| price.category == *category);
        if !present {
            issues.push(ValidationIssue::MissingPriceElements(format!(
                "no active price of category {category:?} for the settlement period"
            )));
        }
    }

    if !input.margin.is_defined_over(&input.period) {
        issues.push(ValidationIssue::MissingPriceElements(
            "supplier margin is not defined for the settlement period".to_string(),
        ));
    }

    if input.pricing_model == PricingModel::SpotAddon
        && !input.spot_prices.covers(&input.period, input.resolution.step())
    {
        issues.push(ValidationIssue::PriceCoverageGap(
            "spot prices do not cover the full settlement period".to_string(),
        ));
    }

    for (price, points) in input.active_prices {
        if !price.category.is_time_varying() {
            continue;
        }
        let step = price.resolution.unwrap_or(input.resolution).step();
        if !points.covers(&input.period, step) {
            issues.push(ValidationIssue::PriceCoverageGap(format!(
                "price {} ({:?}) does not cover the settlement period at {:?} resolution",
                price.charge_id, price.category, step
            )));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(h: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn missing_every_required_category_and_margin_reports_all() {
        let period = Period::closed(ts(0), ts(24));
        let input = ValidationInput {
            pricing_model: PricingModel::Fixed,
            period,
            resolution: Resolution::Hour,
            active_prices: &[],
            spot_prices: &SpotPriceSeries::new(Vec::new()),
            margin: &SupplierMarginSchedule::new(Vec::new()),
        };
        let issues = validate(&input);
        // 4 required categories + margin = 5 issues, no coverage checks since no prices.
        assert_eq!(issues.len(), 5);
    }
}
