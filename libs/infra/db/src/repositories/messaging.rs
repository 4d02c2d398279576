//! Inbox and outbox envelopes. `message_id` uniqueness on the inbox table
//! does the duplicate-delivery rejection from §8's idempotence property —
//! `insert_inbox_message` surfaces it as `DbError::Conflict`.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use settlement_domain_models::{BusinessProcess, DocumentType, InboxMessage, OutboxMessage};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

mod queries {
    pub const INSERT_INBOX: &str = r#"
        INSERT INTO inbox_messages
            (id, message_id, document_type, business_process, sender_id, receiver_id, payload,
             received_at, is_processed, attempts, last_error)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    "#;
    pub const NEXT_INBOX_BATCH: &str = r#"
        SELECT * FROM inbox_messages
        WHERE is_processed = FALSE AND attempts < $1
        ORDER BY received_at
        LIMIT $2
    "#;
    pub const UPDATE_INBOX: &str =
        "UPDATE inbox_messages SET is_processed = $2, attempts = $3, last_error = $4 WHERE id = $1";
    pub const INSERT_OUTBOX: &str = r#"
        INSERT INTO outbox_messages
            (id, document_type, business_process, sender_id, receiver_id, payload,
             is_sent, attempts, last_error, scheduled_for, response)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    "#;
    pub const NEXT_OUTBOX_BATCH: &str = r#"
        SELECT * FROM outbox_messages
        WHERE is_sent = FALSE AND attempts < $1 AND scheduled_for <= $2
        ORDER BY scheduled_for
        LIMIT $3
    "#;
    pub const UPDATE_OUTBOX: &str = r#"
        UPDATE outbox_messages SET
            is_sent = $2, attempts = $3, last_error = $4, scheduled_for = $5, response = $6
        WHERE id = $1
    "#;
}

pub struct MessagingRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct InboxRow {
    id: Uuid,
    message_id: String,
    document_type: String,
    business_process: String,
    sender_id: String,
    receiver_id: String,
    payload: Value,
    received_at: DateTime<Utc>,
    is_processed: bool,
    attempts: i32,
    last_error: Option<String>,
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    document_type: String,
    business_process: String,
    sender_id: String,
    receiver_id: String,
    payload: Value,
    is_sent: bool,
    attempts: i32,
    last_error: Option<String>,
    scheduled_for: DateTime<Utc>,
    response: Option<Value>,
}

impl MessagingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, message))]
    pub async fn insert_inbox_message(&self, message: &InboxMessage) -> Result<(), DbError> {
        let result = sqlx::query(queries::INSERT_INBOX)
            .bind(message.id)
            .bind(&message.message_id)
            .bind(document_type_str(message.document_type))
            .bind(business_process_str(message.business_process))
            .bind(&message.sender_id)
            .bind(&message.receiver_id)
            .bind(&message.payload)
            .bind(message.received_at)
            .bind(message.is_processed)
            .bind(message.attempts)
            .bind(&message.last_error)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = DbError::QueryError(e);
                if err.is_unique_violation() {
                    Err(DbError::Conflict("inbox message_id"))
                } else {
                    Err(err)
                }
            }
        }
    }

    /// §4.7: up to `limit` unprocessed rows under `max_attempts`, oldest first.
    #[instrument(skip(self))]
    pub async fn next_inbox_batch(&self, max_attempts: i32, limit: i64) -> Result<Vec<InboxMessage>, DbError> {
        let rows: Vec<InboxRow> = sqlx::query_as(queries::NEXT_INBOX_BATCH)
            .bind(max_attempts)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::map_inbox).collect()
    }

    #[instrument(skip(self, message))]
    pub async fn update_inbox_message(&self, message: &InboxMessage) -> Result<(), DbError> {
        sqlx::query(queries::UPDATE_INBOX)
            .bind(message.id)
            .bind(message.is_processed)
            .bind(message.attempts)
            .bind(&message.last_error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    pub async fn insert_outbox_message(&self, message: &OutboxMessage) -> Result<(), DbError> {
        sqlx::query(queries::INSERT_OUTBOX)
            .bind(message.id)
            .bind(document_type_str(message.document_type))
            .bind(business_process_str(message.business_process))
            .bind(&message.sender_id)
            .bind(&message.receiver_id)
            .bind(&message.payload)
            .bind(message.is_sent)
            .bind(message.attempts)
            .bind(&message.last_error)
            .bind(message.scheduled_for)
            .bind(&message.response)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// §4.7: up to `limit` unsent rows under `max_retries`, due by `now`.
    /// The backoff gate itself is evaluated by the caller against
    /// `OutboxMessage::next_retry_at`, not by this query.
    #[instrument(skip(self))]
    pub async fn next_outbox_batch(&self, max_retries: i32, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxMessage>, DbError> {
        let rows: Vec<OutboxRow> = sqlx::query_as(queries::NEXT_OUTBOX_BATCH)
            .bind(max_retries)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::map_outbox).collect()
    }

    #[instrument(skip(self, message))]
    pub async fn update_outbox_message(&self, message: &OutboxMessage) -> Result<(), DbError> {
        sqlx::query(queries::UPDATE_OUTBOX)
            .bind(message.id)
            .bind(message.is_sent)
            .bind(message.attempts)
            .bind(&message.last_error)
            .bind(message.scheduled_for)
            .bind(&message.response)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn map_inbox(row: InboxRow) -> Result<InboxMessage, DbError> {
        Ok(InboxMessage {
            id: row.id,
            message_id: row.message_id,
            document_type: parse_document_type(&row.document_type)?,
            business_process: parse_business_process(&row.business_process)?,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            payload: row.payload,
            received_at: row.received_at,
            is_processed: row.is_processed,
            attempts: row.attempts,
            last_error: row.last_error,
        })
    }

    fn map_outbox(row: OutboxRow) -> Result<OutboxMessage, DbError> {
        Ok(OutboxMessage {
            id: row.id,
            document_type: parse_document_type(&row.document_type)?,
            business_process: parse_business_process(&row.business_process)?,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            payload: row.payload,
            is_sent: row.is_sent,
            attempts: row.attempts,
            last_error: row.last_error,
            scheduled_for: row.scheduled_for,
            response: row.response,
        })
    }
}

fn document_type_str(t: DocumentType) -> &'static str {
    match t {
        DocumentType::Confirm => "confirm",
        DocumentType::Reject => "reject",
        DocumentType::Notify => "notify",
    }
}

fn parse_document_type(s: &str) -> Result<DocumentType, DbError> {
    match s {
        "confirm" => Ok(DocumentType::Confirm),
        "reject" => Ok(DocumentType::Reject),
        "notify" => Ok(DocumentType::Notify),
        other => Err(DbError::MappingError(format!("unknown document_type: {other}"))),
    }
}

fn business_process_str(p: BusinessProcess) -> &'static str {
    match p {
        BusinessProcess::SupplyChange => "BRS-001",
        BusinessProcess::EndOfSupply => "BRS-002",
        BusinessProcess::MoveInOrOut => "BRS-003",
        BusinessProcess::CancelMoveInOrOut => "BRS-004",
        BusinessProcess::MasterData => "BRS-006",
        BusinessProcess::MoveInMoveOut => "BRS-009",
        BusinessProcess::MeteredData => "BRS-021",
        BusinessProcess::AggregatedData => "BRS-023",
        BusinessProcess::Wholesale => "BRS-027",
        BusinessProcess::PriceList => "BRS-031",
        BusinessProcess::PriceLink => "BRS-037",
    }
}

fn parse_business_process(s: &str) -> Result<BusinessProcess, DbError> {
    match s {
        "BRS-001" => Ok(BusinessProcess::SupplyChange),
        "BRS-002" => Ok(BusinessProcess::EndOfSupply),
        "BRS-003" => Ok(BusinessProcess::MoveInOrOut),
        "BRS-004" => Ok(BusinessProcess::CancelMoveInOrOut),
        "BRS-006" => Ok(BusinessProcess::MasterData),
        "BRS-009" => Ok(BusinessProcess::MoveInMoveOut),
        "BRS-021" => Ok(BusinessProcess::MeteredData),
        "BRS-023" => Ok(BusinessProcess::AggregatedData),
        "BRS-027" => Ok(BusinessProcess::Wholesale),
        "BRS-031" => Ok(BusinessProcess::PriceList),
        "BRS-037" => Ok(BusinessProcess::PriceLink),
        other => Err(DbError::MappingError(format!("unknown business_process: {other}"))),
    }
}
