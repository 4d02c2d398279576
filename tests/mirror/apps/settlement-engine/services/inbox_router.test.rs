use chrono::{TimeZone, Utc};
use serde_json::json;
use settlement_engine::prelude::*;
use settlement_infra_db::Db;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

async fn seed_metering_point(pool: &sqlx::PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO metering_points (id, gsrn, metering_point_type, category, settlement_method, resolution, connection_state, grid_area_code, grid_company_id, has_active_supply, created_at) VALUES ($1, $2, 'consumption', 'physical', 'hourly', 'hour', 'connected', 'DK1', '5790000000000', false, $3)",
    )
    .bind(id)
    .bind("571313110000012340")
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        port: 0,
        message_hub_base_url: None,
        message_hub_credential: None,
        spot_price_base_url: None,
        spot_price_credential: None,
        http_timeout: Duration::from_secs(5),
        inbox_poll_interval: Duration::from_millis(20),
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

#[sqlx::test]
async fn metered_data_message_creates_first_time_series_version(pool: sqlx::PgPool) -> sqlx::Result<()> {
    settlement_infra_db::schema::apply_schema(&pool).await.unwrap();
    seed_metering_point(&pool).await;

    let db = Db::from_pool(pool.clone());
    let state = AppState::new(db, test_config(String::new()));

    let period_start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let period_end = Utc.with_ymd_and_hms(2026, 1, 1, 3, 0, 0).unwrap();
    let payload = json!({
        "documentName": "NOTIFYVALIDATEDMEASUREDATA",
        "meteringPointGsrn": "571313110000012340",
        "senderId": "5790000000000",
        "receiverId": "5790000000001",
        "period": {"start": period_start.to_rfc3339(), "end": period_end.to_rfc3339()},
        "points": [
            {"position": 1, "quantity": "1.000", "quality": "A01"},
            {"position": 2, "quantity": "1.200", "quality": "A01"},
            {"position": 3, "quantity": "0.900", "quality": "A01"},
        ],
    });

    state
        .messaging
        .insert_inbox_message(&settlement_domain_models::InboxMessage {
            id: Uuid::new_v4(),
            message_id: "msg-metered-1".into(),
            document_type: settlement_domain_models::DocumentType::Notify,
            business_process: settlement_domain_models::BusinessProcess::MeteredData,
            sender_id: "5790000000000".into(),
            receiver_id: "5790000000001".into(),
            payload,
            received_at: Utc::now(),
            is_processed: false,
            attempts: 0,
            last_error: None,
        })
        .await
        .unwrap();

    let shutdown = state.shutdown.clone();
    let handle = tokio::spawn(settlement_engine::services::inbox_router::run(state.clone()));
    sleep(Duration::from_millis(300)).await;
    shutdown.cancel();
    let _ = handle.await;

    let (is_processed,): (bool,) = sqlx::query_as("SELECT is_processed FROM inbox_messages WHERE message_id = $1")
        .bind("msg-metered-1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(is_processed);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM time_series WHERE is_latest = TRUE")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    Ok(())
}
