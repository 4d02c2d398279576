//! Pure settlement math: combines a time series, active prices, spot data
//! and the supplier margin into line items and totals, per §4.5.

use chrono::Utc;
use rust_decimal::Decimal;
use settlement_domain_models::{
    Observation, Period, Price, PricePointSeries, PriceType, PricingModel, Settlement,
    SettlementLine, SettlementLineSource, SettlementStatus, SpotPriceSeries, Supply,
    SupplierMarginSchedule, TimeSeries,
};
use settlement_core_money::{Amount, Quantity, UnitPrice};
use uuid::Uuid;

pub struct CalculationInput<'a> {
    pub time_series: &'a TimeSeries,
    pub supply: &'a Supply,
    pub active_prices: &'a [(Price, PricePointSeries)],
    pub spot_prices: &'a SpotPriceSeries,
    pub margin: &'a SupplierMarginSchedule,
    pub pricing_model: PricingModel,
    /// Drawn from the monotonic `settlement.document_number` sequence by
    /// the caller before invoking the calculator.
    pub document_number: String,
}

/// Observations outside `[period.start, period.end)` are discarded per §8
/// and never contribute to a line's quantity or amount.
fn in_period<'a>(observations: &'a [Observation], period: &'a Period) -> impl Iterator<Item = &'a Observation> {
    observations.iter().filter(move |o| period.contains(o.timestamp))
}

fn energy_lines(input: &CalculationInput, settlement_id: Uuid) -> Vec<SettlementLine> {
    let margin_rate = input.margin.rate_at(input.time_series.period.start).unwrap_or_else(UnitPrice::zero);

    let mut margin_qty = Quantity::zero();
    let mut margin_amount = Amount::zero();
    let mut spot_qty = Quantity::zero();
    let mut spot_amount = Amount::zero();

    for o in in_period(&input.time_series.observations, &input.time_series.period) {
        margin_qty = margin_qty + o.quantity;
        margin_amount = margin_amount + o.quantity.amount_at(margin_rate);
        if input.pricing_model == PricingModel::SpotAddon {
            let spot_rate = input.spot_prices.rate_at(o.timestamp).unwrap_or_else(UnitPrice::zero);
            spot_qty = spot_qty + o.quantity;
            spot_amount = spot_amount + o.quantity.amount_at(spot_rate);
        }
    }

    let mut lines = Vec::new();
    if input.pricing_model == PricingModel::SpotAddon && !spot_qty.is_zero() {
        lines.push(new_line(
            settlement_id,
            "Spot energy",
            SettlementLineSource::Spot,
            spot_qty,
            spot_amount.weighted_unit_price(spot_qty).unwrap_or_else(|_| UnitPrice::zero()),
            spot_amount,
        ));
    }
    if !margin_qty.is_zero() {
        lines.push(new_line(
            settlement_id,
            "Supplier margin",
            SettlementLineSource::SupplierMargin,
            margin_qty,
            margin_amount.weighted_unit_price(margin_qty).unwrap_or_else(|_| UnitPrice::zero()),
            margin_amount,
        ));
    }
    lines
}

fn tariff_lines(input: &CalculationInput, settlement_id: Uuid) -> Vec<SettlementLine> {
    input
        .active_prices
        .iter()
        .filter(|(price, _)| price.price_type == PriceType::Tariff)
        .filter_map(|(price, points)| {
            let mut qty = Quantity::zero();
            let mut amount = Amount::zero();
            for o in in_period(&input.time_series.observations, &input.time_series.period) {
                if let Some(rate) = points.rate_at(o.timestamp) {
                    qty = qty + o.quantity;
                    amount = amount + o.quantity.amount_at(rate);
                }
            }
            if qty.is_zero() {
                return None;
            }
            let unit_price = amount.weighted_unit_price(qty).unwrap_or_else(|_| UnitPrice::zero());
            Some(new_line(settlement_id, &price.description, SettlementLineSource::Tariff, qty, unit_price, amount))
        })
        .collect()
}

/// Days in the settlement period, used to prorate subscription charges.
/// An open-ended period prorates over zero days (it has no definite length).
fn period_days(period: &Period) -> i64 {
    period.end.map_or(0, |end| (end - period.start).num_days())
}

/// Number of calendar days in the month the given instant falls in, used as
/// the denominator when prorating a monthly subscription amount.
fn days_in_month(date: chrono::DateTime<Utc>) -> i64 {
    use chrono::Datelike;
    let (year, month) = (date.year(), date.month());
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_this = chrono::NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let first_of_next = chrono::NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap();
    (first_of_next - first_of_this).num_days()
}

/// A [`PricePoint`](settlement_domain_models::PricePoint) for a subscription
/// charge carries the periodic (monthly) amount (§3). It is prorated across
/// the settlement period by the ratio of period days to days in that month
/// (§4.5), not multiplied by the period's day count outright.
fn subscription_lines(input: &CalculationInput, settlement_id: Uuid) -> Vec<SettlementLine> {
    let period = &input.time_series.period;
    let days = Decimal::from(period_days(period));
    let days_qty = Quantity::new(days);
    let month_len = Decimal::from(days_in_month(period.start));
    input
        .active_prices
        .iter()
        .filter(|(price, _)| price.price_type == PriceType::Subscription)
        .filter_map(|(price, points)| {
            let monthly_rate = points.rate_at(period.start)?;
            let amount = Amount::new(monthly_rate.value() * days / month_len);
            if amount.is_zero() {
                return None;
            }
            let unit_price = amount.weighted_unit_price(days_qty).unwrap_or_else(|_| UnitPrice::zero());
            Some(new_line(settlement_id, &price.description, SettlementLineSource::Subscription, days_qty, unit_price, amount))
        })
        .collect()
}

fn fee_lines(input: &CalculationInput, settlement_id: Uuid) -> Vec<SettlementLine> {
    input
        .active_prices
        .iter()
        .filter(|(price, _)| price.price_type == PriceType::Fee)
        .filter_map(|(price, points)| {
            let rate = points.rate_at(input.time_series.period.start)?;
            let amount = Amount::new(rate.value());
            Some(new_line(settlement_id, &price.description, SettlementLineSource::Fee, Quantity::new(Decimal::ONE), rate, amount))
        })
        .collect()
}

fn new_line(
    settlement_id: Uuid,
    description: &str,
    source: SettlementLineSource,
    quantity: Quantity,
    unit_price: UnitPrice,
    amount: Amount,
) -> SettlementLine {
    SettlementLine {
        id: Uuid::new_v4(),
        settlement_id,
        description: description.to_string(),
        source,
        quantity,
        unit_price,
        amount,
    }
}

/// Computes a fresh settlement (status `Calculated`, `is_correction=false`).
/// Preconditions (required price coverage, active supply) are the caller's
/// responsibility — see [`crate::validator`].
pub fn calculate(input: CalculationInput) -> Settlement {
    let settlement_id = Uuid::new_v4();

    let mut lines = energy_lines(&input, settlement_id);
    lines.extend(tariff_lines(&input, settlement_id));
    lines.extend(subscription_lines(&input, settlement_id));
    lines.extend(fee_lines(&input, settlement_id));

    let total_amount = lines.iter().map(|l| l.amount).sum();

    Settlement {
        id: settlement_id,
        metering_point_id: input.time_series.metering_point_id,
        supply_id: input.supply.id,
        period: input.time_series.period,
        time_series_id: input.time_series.id,
        time_series_version: input.time_series.version,
        total_energy: input.time_series.total_quantity(),
        total_amount,
        status: SettlementStatus::Calculated,
        is_correction: false,
        previous_settlement_id: None,
        invoice_reference: None,
        invoiced_at: None,
        document_number: input.document_number,
        created_at: Utc::now(),
        lines,
    }
}

/// Computes a delta settlement against a prior invoiced (or migrated)
/// settlement. Subscription lines with a zero delta are omitted since they
/// never depend on consumption.
pub fn calculate_correction(input: CalculationInput, original: &Settlement) -> Settlement {
    let new_settlement = calculate(CalculationInput {
        document_number: input.document_number.clone(),
        ..input
    });

    let settlement_id = Uuid::new_v4();
    let lines = delta_lines(settlement_id, &new_settlement.lines, &original.lines);
    let total_amount = lines.iter().map(|l| l.amount).sum();
    let total_energy = new_settlement.total_energy - original.total_energy;

    Settlement {
        id: settlement_id,
        metering_point_id: new_settlement.metering_point_id,
        supply_id: new_settlement.supply_id,
        period: new_settlement.period,
        time_series_id: new_settlement.time_series_id,
        time_series_version: new_settlement.time_series_version,
        total_energy,
        total_amount,
        status: SettlementStatus::Calculated,
        is_correction: true,
        previous_settlement_id: Some(original.id),
        invoice_reference: None,
        invoiced_at: None,
        document_number: new_settlement.document_number,
        created_at: Utc::now(),
        lines,
    }
}

/// Matches new vs. original lines by `(source, description)` and emits the
/// delta; a line present only in the new settlement deltas against zero, and
/// zero-delta subscription lines are dropped (they don't depend on consumption).
fn delta_lines(settlement_id: Uuid, new_lines: &[SettlementLine], original_lines: &[SettlementLine]) -> Vec<SettlementLine> {
    let key = |l: &SettlementLine| (l.source, l.description.clone());

    let mut deltas = Vec::new();
    for new_line_item in new_lines {
        let original_match = original_lines.iter().find(|l| key(l) == key(new_line_item));
        let (orig_qty, orig_amount) = original_match
            .map(|l| (l.quantity, l.amount))
            .unwrap_or((Quantity::zero(), Amount::zero()));

        let delta_qty = new_line_item.quantity - orig_qty;
        let delta_amount = new_line_item.amount - orig_amount;

        if new_line_item.source == SettlementLineSource::Subscription && delta_amount.is_zero() {
            continue;
        }
        if delta_qty.is_zero() && delta_amount.is_zero() {
            continue;
        }

        let unit_price = delta_amount
            .weighted_unit_price(delta_qty)
            .unwrap_or(new_line_item.unit_price);

        deltas.push(new_line(
            settlement_id,
            &new_line_item.description,
            new_line_item.source,
            delta_qty,
            unit_price,
            delta_amount,
        ));
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use settlement_domain_models::{Observation, PriceCategory, PricePoint, Quality};

    fn ts(h: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap()
    }

    fn flat_price(category: PriceCategory, price_type: PriceType, rate: Decimal, period: Period) -> (Price, PricePointSeries) {
        let price = Price {
            id: Uuid::new_v4(),
            charge_id: "C".into(),
            owner_gln: "5790001330552".into(),
            price_type,
            category,
            description: format!("{category:?}"),
            period,
            is_vat_exempt: false,
            is_tax: category == PriceCategory::Tax,
            is_pass_through: false,
            resolution: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let point = PricePoint {
            id: Uuid::new_v4(),
            price_id: price.id,
            timestamp: period.start,
            rate: UnitPrice::new(rate),
            created_at: Utc::now(),
        };
        (price, PricePointSeries::new(vec![point]))
    }

    fn hourly_series(period: Period, quantity: Decimal) -> TimeSeries {
        let observations = period
            .ticks(Duration::hours(1))
            .into_iter()
            .map(|t| Observation { timestamp: t, quantity: Quantity::new(quantity), quality: Quality::Measured })
            .collect();
        TimeSeries {
            id: Uuid::new_v4(),
            metering_point_id: Uuid::new_v4(),
            period,
            version: 1,
            is_latest: true,
            received_at: Utc::now(),
            observations,
        }
    }

    fn supply(metering_point_id: Uuid, period: Period) -> Supply {
        Supply { id: Uuid::new_v4(), metering_point_id, customer_id: Uuid::new_v4(), period, created_at: Utc::now(), updated_at: None }
    }

    /// Scenario 1 from the worked examples: 24 hourly 1.0 kWh observations,
    /// flat tariff 0.50/kWh, flat margin 0.15/kWh, Fixed pricing model.
    #[test]
    fn happy_path_one_day_fixed_pricing() {
        let period = Period::closed(ts(0), ts(24));
        let time_series = hourly_series(period, dec!(1.0));
        let supply = supply(time_series.metering_point_id, period);
        let tariff = flat_price(PriceCategory::NetTariff, PriceType::Tariff, dec!(0.50), period);
        let margin = SupplierMarginSchedule::new(vec![settlement_domain_models::SupplierMarginStep {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            valid_from: period.start,
            rate: UnitPrice::new(dec!(0.15)),
            created_at: Utc::now(),
        }]);

        let input = CalculationInput {
            time_series: &time_series,
            supply: &supply,
            active_prices: &[tariff],
            spot_prices: &SpotPriceSeries::new(Vec::new()),
            margin: &margin,
            pricing_model: PricingModel::Fixed,
            document_number: "WO-2026-00001".to_string(),
        };
        let settlement = calculate(input);

        assert_eq!(settlement.total_energy, Quantity::new(dec!(24.0)));
        assert_eq!(settlement.total_amount, Amount::new(dec!(15.60)));
        assert_eq!(settlement.status, SettlementStatus::Calculated);
        assert!(!settlement.is_correction);
    }

    #[test]
    fn correction_delta_reflects_increased_consumption() {
        let period = Period::closed(ts(0), ts(24));
        let metering_point_id = Uuid::new_v4();
        let original_series = {
            let mut s = hourly_series(period, dec!(1.0));
            s.metering_point_id = metering_point_id;
            s
        };
        let corrected_series = {
            let mut s = hourly_series(period, dec!(1.5));
            s.metering_point_id = metering_point_id;
            s.version = 2;
            s
        };
        let supply = supply(metering_point_id, period);
        let tariff = flat_price(PriceCategory::NetTariff, PriceType::Tariff, dec!(0.50), period);
        let margin = SupplierMarginSchedule::new(Vec::new());

        let original = calculate(CalculationInput {
            time_series: &original_series,
            supply: &supply,
            active_prices: &[tariff.clone()],
            spot_prices: &SpotPriceSeries::new(Vec::new()),
            margin: &margin,
            pricing_model: PricingModel::Fixed,
            document_number: "WO-2026-00001".to_string(),
        });

        let correction = calculate_correction(
            CalculationInput {
                time_series: &corrected_series,
                supply: &supply,
                active_prices: &[tariff],
                spot_prices: &SpotPriceSeries::new(Vec::new()),
                margin: &margin,
                pricing_model: PricingModel::Fixed,
                document_number: "WO-2026-00002".to_string(),
            },
            &original,
        );

        assert!(correction.is_correction);
        assert_eq!(correction.previous_settlement_id, Some(original.id));
        assert_eq!(correction.total_energy, Quantity::new(dec!(12.0)));
        assert_eq!(correction.total_amount, Amount::new(dec!(6.00)));
    }
}
