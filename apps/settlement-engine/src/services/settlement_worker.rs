//! Calculates settlements for unsettled latest-version time series. Each
//! candidate is validated first — missing price coverage raises (or
//! refreshes) a `SettlementIssue` instead of calculating — then run through
//! the pure calculator, choosing a fresh calculation or a delta correction
//! depending on whether an invoiced/migrated predecessor already exists for
//! the same metering point and period.

use crate::state::AppState;
use chrono::{Datelike, Utc};
use settlement_domain_models::{SettlementIssue, SettlementIssueKind, SettlementIssueStatus, TimeSeries};
use settlement_domain_settlement::{calculate, calculate_correction, validate, CalculationInput, ValidationInput, ValidationIssue};
use settlement_infra_db::DbError;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub async fn run(state: AppState) {
    info!("settlement worker starting");
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("settlement worker shutting down");
                return;
            }
            _ = sleep(state.config.settlement_poll_interval) => {}
        }

        let candidates = match state.time_series.unsettled_latest_candidates(state.config.settlement_batch_size).await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "settlement worker: failed to fetch candidates");
                continue;
            }
        };

        for time_series in candidates {
            if let Err(e) = process_one(&state, &time_series).await {
                error!(time_series_id = %time_series.id, error = %e, "settlement worker: failed to process candidate");
            }
        }
    }
}

#[instrument(skip(state, time_series), fields(time_series_id = %time_series.id))]
async fn process_one(state: &AppState, time_series: &TimeSeries) -> Result<(), DbError> {
    if time_series.observations.is_empty() {
        warn!("time series carries no observations, skipped");
        return Ok(());
    }

    let Some(metering_point) = state.metering.find_by_id(time_series.metering_point_id).await? else {
        warn!("time series references an unknown metering point, skipped");
        return Ok(());
    };

    let Some(supply) = state.metering.active_supply_at(metering_point.id, time_series.period.start).await? else {
        raise_issue(state, time_series, SettlementIssueKind::MissingPriceElements, "no active supply for the settlement period".into()).await?;
        return Ok(());
    };

    let Some(product_period) = state.product.active_product_period_at(supply.id, time_series.period.start).await? else {
        raise_issue(state, time_series, SettlementIssueKind::MissingPriceElements, "no product assigned to the supply for the settlement period".into()).await?;
        return Ok(());
    };

    let Some(product) = state.product.find_by_id(product_period.product_id).await? else {
        raise_issue(state, time_series, SettlementIssueKind::MissingPriceElements, "assigned product no longer exists".into()).await?;
        return Ok(());
    };

    let margin = state.product.margin_schedule_for_product(product.id).await?;

    let links = state.price.active_links_for_metering_point(metering_point.id, time_series.period.start).await?;
    let mut active_prices = Vec::with_capacity(links.len());
    for link in &links {
        if let Some(price) = state.price.find_by_id(link.price_id).await? {
            let points = state.price.points_for_price(price.id).await?;
            active_prices.push((price, points));
        }
    }

    let spot_prices = state.market.spot_prices_for_period(&metering_point.grid_area_code, &time_series.period).await?;

    let validation_input = ValidationInput {
        pricing_model: product.pricing_model,
        period: time_series.period,
        resolution: metering_point.resolution,
        active_prices: &active_prices,
        spot_prices: &spot_prices,
        margin: &margin,
    };
    let issues = validate(&validation_input);

    if !issues.is_empty() {
        for issue in issues {
            let (kind, detail) = match issue {
                ValidationIssue::MissingPriceElements(detail) => (SettlementIssueKind::MissingPriceElements, detail),
                ValidationIssue::PriceCoverageGap(detail) => (SettlementIssueKind::PriceCoverageGap, detail),
            };
            raise_issue(state, time_series, kind, detail).await?;
        }
        return Ok(());
    }
    state.settlement.resolve_open_issues(metering_point.id, time_series.id, Utc::now()).await?;

    let document_number = state.settlement.allocate_document_number(time_series.period.start.year()).await?;
    let calculation_input = CalculationInput {
        time_series,
        supply: &supply,
        active_prices: &active_prices,
        spot_prices: &spot_prices,
        margin: &margin,
        pricing_model: product.pricing_model,
        document_number,
    };

    let original = state.settlement.find_invoiced_or_migrated_for_period(metering_point.id, &time_series.period).await?;
    match original {
        Some(original) => {
            let correction = calculate_correction(calculation_input, &original);
            state.settlement.insert(&correction).await?;
            state.settlement.mark_adjusted(original.id).await?;
            info!(settlement_id = %correction.id, previous = %original.id, "correction settlement calculated");
        }
        None => {
            let settlement = calculate(calculation_input);
            state.settlement.insert(&settlement).await?;
            info!(settlement_id = %settlement.id, "settlement calculated");
        }
    }

    Ok(())
}

async fn raise_issue(
    state: &AppState,
    time_series: &TimeSeries,
    kind: SettlementIssueKind,
    detail: String,
) -> Result<(), DbError> {
    let issue = SettlementIssue {
        id: Uuid::new_v4(),
        metering_point_id: time_series.metering_point_id,
        time_series_id: time_series.id,
        time_series_version: time_series.version,
        kind,
        status: SettlementIssueStatus::Open,
        detail,
        created_at: Utc::now(),
        resolved_at: None,
    };
    state.settlement.upsert_issue(&issue).await
}
