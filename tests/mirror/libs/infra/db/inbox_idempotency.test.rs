use chrono::Utc;
use serde_json::json;
use settlement_domain_models::{BusinessProcess, DocumentType, InboxMessage};
use settlement_infra_db::repositories::messaging::MessagingRepository;
use settlement_infra_db::schema::apply_schema;
use uuid::Uuid;

fn message(message_id: &str) -> InboxMessage {
    InboxMessage {
        id: Uuid::new_v4(),
        message_id: message_id.to_string(),
        document_type: DocumentType::Notify,
        business_process: BusinessProcess::MeteredData,
        sender_id: "5790000000000".into(),
        receiver_id: "5790000000001".into(),
        payload: json!({"gsrn": "571313110000012340"}),
        received_at: Utc::now(),
        is_processed: false,
        attempts: 0,
        last_error: None,
    }
}

#[sqlx::test]
async fn duplicate_message_id_is_rejected(pool: sqlx::PgPool) -> sqlx::Result<()> {
    apply_schema(&pool).await.unwrap();
    let repo = MessagingRepository::new(pool);

    repo.insert_inbox_message(&message("msg-1")).await.unwrap();
    let second = repo.insert_inbox_message(&message("msg-1")).await;

    assert!(matches!(second, Err(e) if e.is_unique_violation() || matches!(e, settlement_infra_db::DbError::Conflict(_))));
    Ok(())
}

#[sqlx::test]
async fn next_batch_respects_attempt_ceiling_and_reception_order(pool: sqlx::PgPool) -> sqlx::Result<()> {
    apply_schema(&pool).await.unwrap();
    let repo = MessagingRepository::new(pool);

    let mut exhausted = message("msg-exhausted");
    exhausted.attempts = 5;
    repo.insert_inbox_message(&exhausted).await.unwrap();
    repo.insert_inbox_message(&message("msg-fresh")).await.unwrap();

    let batch = repo.next_inbox_batch(5, 10).await.unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].message_id, "msg-fresh");
    Ok(())
}
