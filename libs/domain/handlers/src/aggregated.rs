//! BRS-023 (aggregated time series) and BRS-027 (wholesale settlement):
//! append-only grid-area-scoped facts from the market operator.

use chrono::Utc;
use settlement_domain_models::{AggregatedTimeSeries, Period, WholesaleSettlement};
use settlement_core_money::{Amount, Quantity};
use uuid::Uuid;

pub fn handle_aggregated_data(grid_area_code: String, period: Period, quantity: Quantity) -> AggregatedTimeSeries {
    AggregatedTimeSeries {
        id: Uuid::new_v4(),
        grid_area_code,
        period,
        quantity,
        received_at: Utc::now(),
    }
}

pub fn handle_wholesale_settlement(
    grid_area_code: String,
    grid_company_id: String,
    period: Period,
    amount: Amount,
) -> WholesaleSettlement {
    WholesaleSettlement {
        id: Uuid::new_v4(),
        grid_area_code,
        grid_company_id,
        period,
        amount,
        received_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_data_is_appended_with_a_fresh_id() {
        let a = handle_aggregated_data("DK1".into(), Period::open_ended(Utc::now()), Quantity::zero());
        let b = handle_aggregated_data("DK1".into(), Period::open_ended(Utc::now()), Quantity::zero());
        assert_ne!(a.id, b.id);
    }
}
