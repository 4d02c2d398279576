//! Drains due outbox messages through the message hub. Accepted sends are
//! marked sent; a rejection is permanent and dead-letters the message by
//! exhausting its retry budget; a transient failure reschedules it at the
//! next exponential backoff step (§7).

use crate::state::AppState;
use chrono::Utc;
use settlement_infra_transport::DispatchOutcome;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

pub async fn run(state: AppState) {
    info!("outbox dispatcher starting");
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("outbox dispatcher shutting down");
                return;
            }
            _ = sleep(state.config.outbox_poll_interval) => {}
        }

        if let Err(e) = drain(&state).await {
            error!(error = %e, "outbox dispatcher: failed to drain batch");
        }
    }
}

async fn drain(state: &AppState) -> Result<(), settlement_infra_db::DbError> {
    let now = Utc::now();
    let batch = state
        .messaging
        .next_outbox_batch(state.config.outbox_max_retries, now, state.config.outbox_batch_size)
        .await?;

    for mut message in batch {
        match dispatch_one(state, &message).await {
            DispatchResult::Sent(response) => {
                message.is_sent = true;
                message.response = response;
            }
            DispatchResult::Rejected(reason) => {
                warn!(id = %message.id, reason, "outbox message rejected, dead-lettered");
                message.attempts = state.config.outbox_max_retries;
                message.last_error = Some(reason);
            }
            DispatchResult::Transient => {
                message.attempts += 1;
                message.scheduled_for = message.next_retry_at(now, state.config.outbox_base_backoff);
            }
        }
        state.messaging.update_outbox_message(&message).await?;
    }
    Ok(())
}

enum DispatchResult {
    Sent(Option<serde_json::Value>),
    Rejected(String),
    Transient,
}

#[instrument(skip(state, message), fields(id = %message.id))]
async fn dispatch_one(state: &AppState, message: &settlement_domain_models::OutboxMessage) -> DispatchResult {
    match state.message_hub.send(message).await {
        Ok(DispatchOutcome::Accepted { response }) => DispatchResult::Sent(response),
        Ok(DispatchOutcome::Rejected { reason }) => DispatchResult::Rejected(reason),
        Ok(DispatchOutcome::TransientFailure) => DispatchResult::Transient,
        Err(e) => {
            warn!(error = %e, "message hub transport error, treated as transient");
            DispatchResult::Transient
        }
    }
}
