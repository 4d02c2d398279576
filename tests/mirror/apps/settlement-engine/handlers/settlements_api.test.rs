use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use settlement_core_money::{Amount, Quantity};
use settlement_domain_models::{Period, Settlement, SettlementStatus};
use settlement_engine::prelude::*;
use settlement_engine::routes;
use settlement_infra_db::Db;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        message_hub_base_url: None,
        message_hub_credential: None,
        spot_price_base_url: None,
        spot_price_credential: None,
        http_timeout: Duration::from_secs(5),
        inbox_poll_interval: Duration::from_secs(3600),
        inbox_batch_size: 50,
        inbox_max_attempts: 5,
        settlement_poll_interval: Duration::from_secs(3600),
        settlement_batch_size: 20,
        outbox_poll_interval: Duration::from_secs(3600),
        outbox_batch_size: 50,
        outbox_max_retries: 8,
        outbox_base_backoff: chrono::Duration::seconds(10),
        spot_price_poll_interval: Duration::from_secs(3600),
        spot_price_bidding_areas: vec!["DK1".to_string()],
    }
}

async fn seed_settlement_chain(pool: &sqlx::PgPool) -> (Uuid, Uuid, Uuid) {
    let metering_point_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO metering_points (id, gsrn, metering_point_type, category, settlement_method, resolution, connection_state, grid_area_code, grid_company_id, has_active_supply, created_at) VALUES ($1, $2, 'consumption', 'physical', 'hourly', 'hour', 'connected', 'DK1', '5790000000000', true, $3)",
    )
    .bind(metering_point_id)
    .bind("571313110000055555")
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();

    let supplier_identity_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO supplier_identities (id, grid_participant_id, name, state, created_at) VALUES ($1, '5790000000000', 'Test Supplier', 'active', $2)",
    )
    .bind(supplier_identity_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();

    let customer_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO customers (id, supplier_identity_id, identity_kind, identity_value, name, created_at) VALUES ($1, $2, 'cpr', '0101701234', 'Test Customer', $3)",
    )
    .bind(customer_id)
    .bind(supplier_identity_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();

    let supply_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO supplies (id, metering_point_id, customer_id, period_start, period_end, created_at, updated_at) VALUES ($1, $2, $3, $4, NULL, $4, NULL)",
    )
    .bind(supply_id)
    .bind(metering_point_id)
    .bind(customer_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();

    let time_series_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO time_series (id, metering_point_id, period_start, period_end, resolution, version, is_latest, transaction_id, received_at) VALUES ($1, $2, $3, $4, 'hour', 1, true, NULL, $3)",
    )
    .bind(time_series_id)
    .bind(metering_point_id)
    .bind(Utc::now())
    .bind(Utc::now() + chrono::Duration::hours(1))
    .execute(pool)
    .await
    .unwrap();

    (metering_point_id, supply_id, time_series_id)
}

fn calculated_settlement(metering_point_id: Uuid, supply_id: Uuid, time_series_id: Uuid) -> Settlement {
    let now = Utc::now();
    Settlement {
        id: Uuid::new_v4(),
        metering_point_id,
        supply_id,
        period: Period::closed(now, now + chrono::Duration::hours(1)),
        time_series_id,
        time_series_version: 1,
        total_energy: Quantity::new(dec!(1.5)),
        total_amount: Amount::new(dec!(3.75)),
        status: SettlementStatus::Calculated,
        is_correction: false,
        previous_settlement_id: None,
        invoice_reference: None,
        invoiced_at: None,
        document_number: "WO-2026-00001".to_string(),
        created_at: now,
        lines: Vec::new(),
    }
}

/// Full read/write cycle through the HTTP surface: listing defaults to
/// calculated settlements, invoicing succeeds once and is rejected the
/// second time since the settlement is no longer `Calculated`.
#[sqlx::test]
async fn invoice_lifecycle_through_http(pool: sqlx::PgPool) -> sqlx::Result<()> {
    settlement_infra_db::schema::apply_schema(&pool).await.unwrap();
    let (metering_point_id, supply_id, time_series_id) = seed_settlement_chain(&pool).await;

    let db = Db::from_pool(pool.clone());
    let state = AppState::new(db, test_config());

    let settlement = calculated_settlement(metering_point_id, supply_id, time_series_id);
    let settlement_id = settlement.id;
    state.settlement.insert(&settlement).await.unwrap();

    let app = routes::build(state.clone());

    let res = app
        .clone()
        .oneshot(Request::builder().uri("/api/v1/settlements/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let listed: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(listed.len(), 1);

    let invoice_body = Body::from(serde_json::to_vec(&json!({"invoice_reference": "INV-0001"})).unwrap());
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/settlements/{settlement_id}/invoice"))
                .header("content-type", "application/json")
                .body(invoice_body)
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let second_invoice_body = Body::from(serde_json::to_vec(&json!({"invoice_reference": "INV-0002"})).unwrap());
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/settlements/{settlement_id}/invoice"))
                .header("content-type", "application/json")
                .body(second_invoice_body)
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .clone()
        .oneshot(Request::builder().uri(format!("/api/v1/settlements/{}", Uuid::new_v4())).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}
