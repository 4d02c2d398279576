//! Pulls day-ahead spot prices for each configured bidding area and stores
//! them for the settlement worker's `SpotAddon` pricing model. Fetches a
//! window from the start of today through the end of tomorrow on every
//! poll — wide enough to pick up a late publication of tomorrow's prices
//! without missing a correction to today's.

use crate::state::AppState;
use chrono::{Duration as ChronoDuration, Utc};
use settlement_domain_models::SpotPrice;
use settlement_infra_transport::SpotPriceQuote;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub async fn run(state: AppState) {
    info!("spot price ingester starting");
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("spot price ingester shutting down");
                return;
            }
            _ = sleep(state.config.spot_price_poll_interval) => {}
        }

        for bidding_area in &state.config.spot_price_bidding_areas {
            if let Err(e) = ingest_area(&state, bidding_area).await {
                error!(bidding_area, error = %e, "spot price ingester: failed to fetch or store quotes");
            }
        }
    }
}

#[instrument(skip(state))]
async fn ingest_area(state: &AppState, bidding_area: &str) -> Result<(), settlement_infra_db::DbError> {
    let now = Utc::now();
    let from = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let to = from + ChronoDuration::days(2);

    let quotes = match state.spot_price_provider.fetch(bidding_area, from, to).await {
        Ok(quotes) => quotes,
        Err(e) => {
            warn!(bidding_area, error = %e, "spot price provider fetch failed");
            return Ok(());
        }
    };

    let received_at = Utc::now();
    for quote in quotes {
        state.market.upsert_spot_price(&spot_price_from(quote, received_at)).await?;
    }
    Ok(())
}

fn spot_price_from(quote: SpotPriceQuote, received_at: chrono::DateTime<Utc>) -> SpotPrice {
    SpotPrice {
        id: Uuid::new_v4(),
        bidding_area: quote.bidding_area,
        timestamp: quote.timestamp,
        rate: quote.rate,
        received_at,
    }
}
