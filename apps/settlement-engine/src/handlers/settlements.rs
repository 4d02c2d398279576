//! Read access to calculated settlements and the single write path the API
//! exposes: marking a settlement invoiced. Everything else (calculation,
//! correction, issue tracking) is driven by the background workers.

use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use settlement_domain_models::SettlementStatus;
use tracing::{error, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
    #[serde(default)]
    corrections_only: bool,
}

#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> impl IntoResponse {
    if query.corrections_only {
        return match state.settlement.corrections().await {
            Ok(settlements) => Json(settlements).into_response(),
            Err(e) => {
                error!(error = %e, "failed to list corrections");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    let status = match query.status.as_deref() {
        Some(s) => match parse_status(s) {
            Some(status) => status,
            None => return (StatusCode::BAD_REQUEST, format!("unknown status: {s}")).into_response(),
        },
        None => SettlementStatus::Calculated,
    };

    match state.settlement.by_status(status).await {
        Ok(settlements) => Json(settlements).into_response(),
        Err(e) => {
            error!(error = %e, "failed to list settlements by status");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[instrument(skip(state))]
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.settlement.find_by_id(id).await {
        Ok(Some(settlement)) => Json(settlement).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(error = %e, "failed to load settlement");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InvoiceRequest {
    invoice_reference: String,
}

#[instrument(skip(state, body))]
pub async fn invoice(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<InvoiceRequest>) -> impl IntoResponse {
    let mut settlement = match state.settlement.find_by_id(id).await {
        Ok(Some(settlement)) => settlement,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(error = %e, "failed to load settlement");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let at = Utc::now();
    if let Err(e) = settlement.mark_invoiced(body.invoice_reference.clone(), at) {
        warn!(settlement_id = %id, error = %e, "rejected invoice transition");
        return (StatusCode::CONFLICT, e.to_string()).into_response();
    }

    match state.settlement.mark_invoiced(id, &body.invoice_reference, at).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(error = %e, "failed to persist invoiced status");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn parse_status(s: &str) -> Option<SettlementStatus> {
    match s {
        "calculated" => Some(SettlementStatus::Calculated),
        "invoiced" => Some(SettlementStatus::Invoiced),
        "adjusted" => Some(SettlementStatus::Adjusted),
        "migrated" => Some(SettlementStatus::Migrated),
        _ => None,
    }
}
