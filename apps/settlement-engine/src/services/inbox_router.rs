//! Drains the message hub's inbound queue into the `inbox_messages` table,
//! then classifies and applies each unprocessed row. Three outcomes per
//! message: handled (mark processed), data absence (log and mark processed
//! anyway — nothing will make the referenced entity appear on retry),
//! or a malformed/invalid payload (record the failure, dead-letter once
//! attempts are exhausted). A transient failure (a database hiccup) is left
//! untouched so the next poll tries again.

use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde_json::Value;
use settlement_core_identifiers::{CompanyNumber, CustomerIdentity, GridParticipantId, Gsrn, PersonalNumber};
use settlement_domain_handlers::{
    handle_aggregated_data, handle_master_data, handle_metered_data, handle_move_in, handle_move_out,
    handle_price_info, handle_price_link, handle_price_series, handle_supply_change, handle_wholesale_settlement,
    MasterDataOutcome, MeteredDataInput, MeteredDataOutcome, MoveOutcome, PriceHandlerError, PriceInfoOutcome,
    PriceInfoUpdate, PriceLinkOutcome, PriceSeriesOutcome, SupplyChangeOutcome,
};
use settlement_domain_messaging::classifier::classify;
use settlement_domain_messaging::payload::{
    extract_period, extract_str, extract_timestamp, parse_points, points_to_observations, unwrap_value, PayloadError,
};
use settlement_domain_models::{
    Address, Customer, DocumentType, InboxMessage, MeteringPointUpdate, Period, PriceCategory, PricePoint, PriceType,
    Resolution,
};
use settlement_core_money::{Amount, Quantity, UnitPrice};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub async fn run(state: AppState) {
    info!("inbox router starting");
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                info!("inbox router shutting down");
                return;
            }
            _ = sleep(state.config.inbox_poll_interval) => {}
        }

        if let Err(e) = fetch_new(&state).await {
            error!(error = %e, "inbox router: failed to poll inbound envelopes");
        }

        if let Err(e) = drain_batch(&state).await {
            error!(error = %e, "inbox router: failed to drain inbox batch");
        }
    }
}

#[instrument(skip(state))]
async fn fetch_new(state: &AppState) -> Result<(), settlement_infra_transport::TransportError> {
    let envelopes = state.message_hub.poll_inbound(state.config.inbox_batch_size as usize).await?;
    for envelope in envelopes {
        let document_name = envelope.payload.get("documentName").and_then(Value::as_str);
        let process_type_code = envelope.payload.get("processTypeCode").and_then(Value::as_str);

        let (business_process, document_type) = match classify(document_name, process_type_code) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(message_id = %envelope.message_id, error = %e, "unclassifiable inbound envelope, dropped");
                continue;
            }
        };

        let message = InboxMessage {
            id: Uuid::new_v4(),
            message_id: envelope.message_id.clone(),
            document_type,
            business_process,
            sender_id: extract_str(&envelope.payload, "senderId").unwrap_or_default().to_string(),
            receiver_id: extract_str(&envelope.payload, "receiverId").unwrap_or_default().to_string(),
            payload: envelope.payload,
            received_at: envelope.received_at,
            is_processed: false,
            attempts: 0,
            last_error: None,
        };

        match state.messaging.insert_inbox_message(&message).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                // already on file; duplicate delivery, silently ignored.
            }
            Err(e) => warn!(message_id = %envelope.message_id, error = %e, "failed to persist inbound envelope"),
        }
    }
    Ok(())
}

async fn drain_batch(state: &AppState) -> Result<(), settlement_infra_db::DbError> {
    let batch = state.messaging.next_inbox_batch(state.config.inbox_max_attempts, state.config.inbox_batch_size).await?;
    for mut message in batch {
        match dispatch(state, &message).await {
            Outcome::Processed | Outcome::Skipped => {
                message.record_success();
                state.messaging.update_inbox_message(&message).await?;
            }
            Outcome::ContractViolation(reason) => {
                message.record_failure(reason);
                if message.exhausted() {
                    warn!(id = %message.id, "inbox message dead-lettered after exhausting attempts");
                }
                state.messaging.update_inbox_message(&message).await?;
            }
            Outcome::Transient(reason) => {
                warn!(id = %message.id, reason, "transient failure processing inbox message, left for retry");
            }
        }
    }
    Ok(())
}

enum Outcome {
    Processed,
    Skipped,
    ContractViolation(String),
    Transient(String),
}

fn db_outcome(e: settlement_infra_db::DbError) -> Outcome {
    use settlement_infra_db::DbError;
    match e {
        DbError::MappingError(msg) => Outcome::ContractViolation(msg),
        DbError::NotFound(what) => Outcome::ContractViolation(format!("referenced {what} not found")),
        DbError::InvalidState(err) => Outcome::ContractViolation(err.to_string()),
        other => Outcome::Transient(other.to_string()),
    }
}

fn payload_outcome(e: PayloadError) -> Outcome {
    Outcome::ContractViolation(e.to_string())
}

#[instrument(skip(state, message), fields(business_process = ?message.business_process))]
async fn dispatch(state: &AppState, message: &InboxMessage) -> Outcome {
    use settlement_domain_models::BusinessProcess::*;
    let payload = &message.payload;
    let result = match message.business_process {
        MeteredData => handle_metered_data_message(state, payload, message.received_at).await,
        MasterData => handle_master_data_message(state, payload).await,
        SupplyChange => handle_supply_change_message(state, payload, message.document_type).await,
        MoveInMoveOut | MoveInOrOut => handle_move_message(state, payload).await,
        EndOfSupply | CancelMoveInOrOut => handle_close_supply_message(state, payload).await,
        AggregatedData => handle_aggregated_message(state, payload).await,
        Wholesale => handle_wholesale_message(state, payload).await,
        PriceList => handle_price_list_message(state, payload).await,
        PriceLink => handle_price_link_message(state, payload).await,
    };
    match result {
        Ok(outcome) => outcome,
        Err(outcome) => outcome,
    }
}

fn parse_gsrn(payload: &Value) -> Result<Gsrn, Outcome> {
    let raw = extract_str(payload, "meteringPointGsrn").map_err(payload_outcome)?;
    Gsrn::new(raw).map_err(|e| Outcome::ContractViolation(e.to_string()))
}

async fn handle_metered_data_message(state: &AppState, payload: &Value, received_at: DateTime<Utc>) -> Result<Outcome, Outcome> {
    let gsrn = parse_gsrn(payload)?;
    let metering_point = state.metering.find_by_gsrn(&gsrn).await.map_err(db_outcome)?;
    let Some(metering_point) = metering_point else {
        return Ok(Outcome::Skipped);
    };

    let period = extract_period(payload, "period").map_err(payload_outcome)?;
    let points_raw = payload.get("points").ok_or(Outcome::ContractViolation("missing field 'points'".into()))?;
    let points = parse_points(points_raw).map_err(payload_outcome)?;
    let observations =
        points_to_observations(&points, period.start, metering_point.resolution.step()).map_err(payload_outcome)?;

    let existing_latest = state.time_series.find_latest_for_period(metering_point.id, &period).await.map_err(db_outcome)?;

    let outcome = handle_metered_data(
        Some(&metering_point),
        existing_latest.as_ref(),
        MeteredDataInput { metering_point_id: metering_point.id, period, observations, received_at },
    );

    match outcome {
        MeteredDataOutcome::MeteringPointNotFound => Ok(Outcome::Skipped),
        MeteredDataOutcome::Versioned { new_series, supersedes } => {
            state
                .time_series
                .insert_new_version(&new_series, metering_point.resolution, None, supersedes)
                .await
                .map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
    }
}

fn metering_point_update_from(payload: &Value) -> MeteringPointUpdate {
    let connection_state = extract_str(payload, "connectionState").ok().and_then(|s| match s {
        "new" => Some(settlement_domain_models::ConnectionState::New),
        "connected" => Some(settlement_domain_models::ConnectionState::Connected),
        "disconnected" => Some(settlement_domain_models::ConnectionState::Disconnected),
        _ => None,
    });
    let grid_area_code = extract_str(payload, "gridAreaCode").ok().map(|s| s.to_string());
    let grid_company_id = extract_str(payload, "gridCompanyId").ok().map(|s| s.to_string());
    let resolution = extract_str(payload, "resolution").ok().and_then(|s| match s {
        "hour" => Some(Resolution::Hour),
        "quarter_hour" => Some(Resolution::QuarterHour),
        _ => None,
    });
    let address = payload.get("address").and_then(|v| unwrap_value(v).as_object()).map(|obj| Address {
        street_name: obj.get("streetName").and_then(Value::as_str).map(String::from),
        building_number: obj.get("buildingNumber").and_then(Value::as_str).map(String::from),
        postal_code: obj.get("postalCode").and_then(Value::as_str).map(String::from),
        city: obj.get("city").and_then(Value::as_str).map(String::from),
    });
    MeteringPointUpdate { connection_state, grid_area_code, grid_company_id, address, resolution }
}

async fn handle_master_data_message(state: &AppState, payload: &Value) -> Result<Outcome, Outcome> {
    let gsrn = parse_gsrn(payload)?;
    let metering_point = state.metering.find_by_gsrn(&gsrn).await.map_err(db_outcome)?;
    let update = metering_point_update_from(payload);

    match handle_master_data(metering_point.as_ref(), update) {
        MasterDataOutcome::MeteringPointNotFound => Ok(Outcome::Skipped),
        MasterDataOutcome::Updated(updated) => {
            state.metering.update(&updated).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
    }
}

fn customer_identity_from(payload: &Value) -> Result<CustomerIdentity, Outcome> {
    if let Ok(personal) = extract_str(payload, "customerPersonalNumber") {
        return PersonalNumber::new(personal)
            .map(CustomerIdentity::Personal)
            .map_err(|e| Outcome::ContractViolation(e.to_string()));
    }
    if let Ok(company) = extract_str(payload, "customerCompanyNumber") {
        return CompanyNumber::new(company)
            .map(CustomerIdentity::Company)
            .map_err(|e| Outcome::ContractViolation(e.to_string()));
    }
    Err(Outcome::ContractViolation("message carries neither a personal nor a company customer number".into()))
}

async fn resolve_or_create_customer(state: &AppState, payload: &Value) -> Result<Customer, Outcome> {
    let identity = customer_identity_from(payload)?;
    if let Some(existing) = state.customer.find_customer_by_identity(&identity).await.map_err(db_outcome)? {
        return Ok(existing);
    }
    let supplier_gln = extract_str(payload, "supplierGln").map_err(payload_outcome)?;
    let supplier_identity = state
        .customer
        .find_supplier_identity_by_gln(&GridParticipantId::new(supplier_gln).map_err(|e| Outcome::ContractViolation(e.to_string()))?)
        .await
        .map_err(db_outcome)?
        .ok_or_else(|| Outcome::ContractViolation(format!("unknown supplier identity {supplier_gln}")))?;
    let name = extract_str(payload, "customerName").unwrap_or("").to_string();
    let customer = Customer {
        id: Uuid::new_v4(),
        supplier_identity_id: supplier_identity.id,
        number: identity,
        name,
        created_at: Utc::now(),
        updated_at: None,
    };
    state.customer.insert_customer(&customer).await.map_err(db_outcome)?;
    Ok(customer)
}

async fn handle_supply_change_message(state: &AppState, payload: &Value, document_type: DocumentType) -> Result<Outcome, Outcome> {
    let gsrn = parse_gsrn(payload)?;
    let metering_point = state.metering.find_by_gsrn(&gsrn).await.map_err(db_outcome)?;
    let Some(metering_point) = metering_point else {
        return Ok(Outcome::Skipped);
    };
    let effective_date = extract_timestamp(payload, "effectiveDate").map_err(payload_outcome)?;
    let customer = resolve_or_create_customer(state, payload).await?;

    match handle_supply_change(document_type, metering_point.id, customer.id, effective_date) {
        SupplyChangeOutcome::Rejected => Ok(Outcome::Skipped),
        SupplyChangeOutcome::Started(new_supply) => {
            if let Some(mut current) = state.metering.active_supply_at(metering_point.id, effective_date).await.map_err(db_outcome)? {
                current.period = Period::closed(current.period.start, effective_date);
                current.updated_at = Some(Utc::now());
                state.metering.insert_supply(&current).await.map_err(db_outcome)?;
            }
            state.metering.insert_supply(&new_supply).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
    }
}

async fn handle_move_message(state: &AppState, payload: &Value) -> Result<Outcome, Outcome> {
    let gsrn = parse_gsrn(payload)?;
    let metering_point = state.metering.find_by_gsrn(&gsrn).await.map_err(db_outcome)?;
    let Some(metering_point) = metering_point else {
        return Ok(Outcome::Skipped);
    };
    let effective_date = extract_timestamp(payload, "effectiveDate").map_err(payload_outcome)?;
    let move_type = extract_str(payload, "moveType").unwrap_or("move_in");
    let current = state.metering.active_supply_at(metering_point.id, effective_date).await.map_err(db_outcome)?;

    let outcome = if move_type == "move_out" {
        handle_move_out(current.as_ref(), effective_date)
    } else {
        let customer = resolve_or_create_customer(state, payload).await?;
        handle_move_in(current.as_ref(), metering_point.id, customer.id, effective_date)
    };

    persist_move_outcome(state, outcome).await
}

async fn handle_close_supply_message(state: &AppState, payload: &Value) -> Result<Outcome, Outcome> {
    let gsrn = parse_gsrn(payload)?;
    let metering_point = state.metering.find_by_gsrn(&gsrn).await.map_err(db_outcome)?;
    let Some(metering_point) = metering_point else {
        return Ok(Outcome::Skipped);
    };
    let effective_date = extract_timestamp(payload, "effectiveDate").map_err(payload_outcome)?;
    let current = state.metering.active_supply_at(metering_point.id, effective_date).await.map_err(db_outcome)?;
    persist_move_outcome(state, handle_move_out(current.as_ref(), effective_date)).await
}

async fn persist_move_outcome(state: &AppState, outcome: MoveOutcome) -> Result<Outcome, Outcome> {
    match outcome {
        MoveOutcome::MovedIn(opened) => {
            state.metering.insert_supply(&opened).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
        MoveOutcome::Replaced { closed, opened } => {
            state.metering.insert_supply(&closed).await.map_err(db_outcome)?;
            state.metering.insert_supply(&opened).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
        MoveOutcome::MovedOut(Some(closed)) => {
            state.metering.insert_supply(&closed).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
        MoveOutcome::MovedOut(None) => Ok(Outcome::Skipped),
    }
}

async fn handle_aggregated_message(state: &AppState, payload: &Value) -> Result<Outcome, Outcome> {
    let grid_area_code = extract_str(payload, "gridAreaCode").map_err(payload_outcome)?.to_string();
    let period = extract_period(payload, "period").map_err(payload_outcome)?;
    let raw = extract_str(payload, "quantity").map_err(payload_outcome)?;
    let quantity = Quantity::new(raw.parse().map_err(|_| Outcome::ContractViolation("invalid quantity".into()))?);
    let aggregated = handle_aggregated_data(grid_area_code, period, quantity);
    state.market.insert_aggregated(&aggregated).await.map_err(db_outcome)?;
    Ok(Outcome::Processed)
}

async fn handle_wholesale_message(state: &AppState, payload: &Value) -> Result<Outcome, Outcome> {
    let grid_area_code = extract_str(payload, "gridAreaCode").map_err(payload_outcome)?.to_string();
    let grid_company_id = extract_str(payload, "gridCompanyId").map_err(payload_outcome)?.to_string();
    let period = extract_period(payload, "period").map_err(payload_outcome)?;
    let raw = extract_str(payload, "amount").map_err(payload_outcome)?;
    let amount = Amount::new(raw.parse().map_err(|_| Outcome::ContractViolation("invalid amount".into()))?);
    let settlement = handle_wholesale_settlement(grid_area_code, grid_company_id, period, amount);
    state.market.insert_wholesale(&settlement).await.map_err(db_outcome)?;
    Ok(Outcome::Processed)
}

fn price_category_from(s: &str) -> Option<PriceCategory> {
    Some(match s {
        "nettariff" => PriceCategory::NetTariff,
        "system" => PriceCategory::System,
        "transmission" => PriceCategory::Transmission,
        "tax" => PriceCategory::Tax,
        "spot" => PriceCategory::Spot,
        "margin" => PriceCategory::Margin,
        "other" => PriceCategory::Other,
        _ => return None,
    })
}

fn price_type_from(s: &str) -> Option<PriceType> {
    Some(match s {
        "tariff" => PriceType::Tariff,
        "subscription" => PriceType::Subscription,
        "fee" => PriceType::Fee,
        _ => return None,
    })
}

async fn handle_price_list_message(state: &AppState, payload: &Value) -> Result<Outcome, Outcome> {
    let business_reason = extract_str(payload, "businessReason").unwrap_or("D18");
    let charge_id = extract_str(payload, "chargeId").map_err(payload_outcome)?.to_string();
    let owner_gln = extract_str(payload, "ownerGln").map_err(payload_outcome)?.to_string();
    let existing = state.price.find_by_charge_and_owner(&charge_id, &owner_gln).await.map_err(db_outcome)?;

    if business_reason == "D08" {
        let Some(existing) = existing else {
            return Ok(Outcome::Skipped);
        };
        let range = extract_period(payload, "period").map_err(payload_outcome)?;
        let points_raw = payload.get("points").ok_or(Outcome::ContractViolation("missing field 'points'".into()))?;
        let wire_points = parse_points(points_raw).map_err(payload_outcome)?;
        let step = existing.resolution.unwrap_or(Resolution::Hour).step();
        let new_points = wire_points
            .into_iter()
            .map(|p| PricePoint {
                id: Uuid::new_v4(),
                price_id: existing.id,
                timestamp: range.start + step * (p.position.saturating_sub(1) as i32),
                rate: UnitPrice::new(p.quantity),
                created_at: Utc::now(),
            })
            .collect::<Vec<_>>();

        return match handle_price_series(Some(&existing), range, new_points) {
            PriceSeriesOutcome::PriceNotFound => Ok(Outcome::Skipped),
            PriceSeriesOutcome::Replace { price_id, range, new_points } => {
                state.price.replace_points_in_range(price_id, &range, &new_points).await.map_err(db_outcome)?;
                Ok(Outcome::Processed)
            }
        };
    }

    let category = extract_str(payload, "category")
        .ok()
        .and_then(price_category_from)
        .ok_or_else(|| Outcome::ContractViolation("missing or unknown price category".into()))?;
    let price_type = extract_str(payload, "priceType")
        .ok()
        .and_then(price_type_from)
        .ok_or_else(|| Outcome::ContractViolation("missing or unknown price type".into()))?;
    let period = extract_period(payload, "period").map_err(payload_outcome)?;
    let resolution = extract_str(payload, "resolution").ok().and_then(|s| match s {
        "hour" => Some(Resolution::Hour),
        "quarter_hour" => Some(Resolution::QuarterHour),
        _ => None,
    });
    let update = PriceInfoUpdate {
        description: extract_str(payload, "description").unwrap_or("").to_string(),
        category,
        period,
        is_vat_exempt: payload.get("isVatExempt").and_then(Value::as_bool).unwrap_or(false),
        is_tax: payload.get("isTax").and_then(Value::as_bool).unwrap_or(false),
        is_pass_through: payload.get("isPassThrough").and_then(Value::as_bool).unwrap_or(false),
        resolution,
        price_type,
    };

    let outcome = handle_price_info(existing.as_ref(), charge_id, owner_gln, update)
        .map_err(|e: PriceHandlerError| Outcome::ContractViolation(e.to_string()))?;
    match outcome {
        PriceInfoOutcome::Created(price) => {
            state.price.insert_price(&price).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
        PriceInfoOutcome::Updated(price) => {
            state.price.update_price(&price).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
    }
}

async fn handle_price_link_message(state: &AppState, payload: &Value) -> Result<Outcome, Outcome> {
    let charge_id = extract_str(payload, "chargeId").map_err(payload_outcome)?.to_string();
    let owner_gln = extract_str(payload, "ownerGln").map_err(payload_outcome)?.to_string();
    let gsrn = parse_gsrn(payload)?;
    let period = extract_period(payload, "period").map_err(payload_outcome)?;

    let price = state
        .price
        .find_by_charge_and_owner(&charge_id, &owner_gln)
        .await
        .map_err(db_outcome)?
        .ok_or_else(|| Outcome::ContractViolation(format!("unknown charge {charge_id}/{owner_gln}")))?;
    let Some(metering_point) = state.metering.find_by_gsrn(&gsrn).await.map_err(db_outcome)? else {
        return Ok(Outcome::Skipped);
    };

    let existing_link = state.price.find_link(price.id, metering_point.id).await.map_err(db_outcome)?;
    match handle_price_link(existing_link.as_ref(), price.id, metering_point.id, period) {
        PriceLinkOutcome::Created(link) => {
            state.price.insert_link(&link).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
        PriceLinkOutcome::Updated(link) => {
            state.price.update_link(&link).await.map_err(db_outcome)?;
            Ok(Outcome::Processed)
        }
    }
}
