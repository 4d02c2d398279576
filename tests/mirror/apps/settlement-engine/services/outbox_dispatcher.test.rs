use chrono::Utc;
use serde_json::json;
use settlement_domain_models::{BusinessProcess, DocumentType, OutboxMessage};
use settlement_engine::prelude::*;
use settlement_infra_db::Db;
use std::time::Duration;
use tokio::time::sleep;
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
        outbox_poll_interval: Duration::from_millis(20),
        outbox_batch_size: 50,
        outbox_max_retries: 8,
        outbox_base_backoff: chrono::Duration::seconds(10),
        spot_price_poll_interval: Duration::from_secs(3600),
        spot_price_bidding_areas: vec!["DK1".to_string()],
    }
}

/// No message hub credentials are configured, so `AppState::new` selects
/// `SimulationMessageHub`, which accepts every send. A due outbox row
/// should come out marked sent on the next poll.
#[sqlx::test]
async fn due_message_is_marked_sent_in_simulation_mode(pool: sqlx::PgPool) -> sqlx::Result<()> {
    settlement_infra_db::schema::apply_schema(&pool).await.unwrap();

    let db = Db::from_pool(pool.clone());
    let state = AppState::new(db, test_config());

    let id = Uuid::new_v4();
    state
        .messaging
        .insert_outbox_message(&OutboxMessage {
            id,
            document_type: DocumentType::Confirm,
            business_process: BusinessProcess::MeteredData,
            sender_id: "5790000000000".into(),
            receiver_id: "5790000000001".into(),
            payload: json!({"status": "accepted"}),
            is_sent: false,
            attempts: 0,
            last_error: None,
            scheduled_for: Utc::now() - chrono::Duration::seconds(1),
            response: None,
        })
        .await
        .unwrap();

    let shutdown = state.shutdown.clone();
    let handle = tokio::spawn(settlement_engine::services::outbox_dispatcher::run(state.clone()));
    sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    let _ = handle.await;

    let (is_sent, attempts): (bool, i32) =
        sqlx::query_as("SELECT is_sent, attempts FROM outbox_messages WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(is_sent);
    assert_eq!(attempts, 0);

    Ok(())
}
