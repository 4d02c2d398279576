//! Inbound/outbound message envelopes and the business-process taxonomy
//! used to classify and route them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Closed table of BRS processes this engine understands, per §6's
/// process-type fallback mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusinessProcess {
    #[serde(rename = "BRS-001")]
    SupplyChange,
    #[serde(rename = "BRS-002")]
    EndOfSupply,
    #[serde(rename = "BRS-003")]
    MoveInOrOut,
    #[serde(rename = "BRS-004")]
    CancelMoveInOrOut,
    #[serde(rename = "BRS-006")]
    MasterData,
    #[serde(rename = "BRS-009")]
    MoveInMoveOut,
    #[serde(rename = "BRS-021")]
    MeteredData,
    #[serde(rename = "BRS-023")]
    AggregatedData,
    #[serde(rename = "BRS-027")]
    Wholesale,
    #[serde(rename = "BRS-031")]
    PriceList,
    #[serde(rename = "BRS-037")]
    PriceLink,
}

impl BusinessProcess {
    /// The closed code→process fallback table from §6, used when the
    /// document-name prefix alone does not resolve.
    pub fn from_process_code(code: &str) -> Option<Self> {
        match code {
            "E03" => Some(Self::SupplyChange),
            "E20" => Some(Self::EndOfSupply),
            "D34" | "D35" | "D07" => Some(Self::MoveInOrOut),
            "E04" => Some(Self::CancelMoveInOrOut),
            "E06" => Some(Self::MasterData),
            "E65" => Some(Self::MoveInMoveOut),
            "E23" => Some(Self::MeteredData),
            "D04" => Some(Self::AggregatedData),
            "D05" => Some(Self::Wholesale),
            "D18" => Some(Self::PriceList),
            "D17" => Some(Self::PriceLink),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Confirm,
    Reject,
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: Uuid,
    pub message_id: String,
    pub document_type: DocumentType,
    pub business_process: BusinessProcess,
    pub sender_id: String,
    pub receiver_id: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
    pub is_processed: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl InboxMessage {
    pub const MAX_ATTEMPTS: i32 = 5;

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.last_error = Some(error.into());
    }

    pub fn record_success(&mut self) {
        self.is_processed = true;
        self.last_error = None;
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= Self::MAX_ATTEMPTS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub document_type: DocumentType,
    pub business_process: BusinessProcess,
    pub sender_id: String,
    pub receiver_id: String,
    pub payload: Value,
    pub is_sent: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub response: Option<Value>,
}

impl OutboxMessage {
    /// Exponential backoff applied to outbound dispatch only, per §7:
    /// `base_delay * 2^attempts`, capped by the caller's max-retries check.
    pub fn next_retry_at(&self, now: DateTime<Utc>, base_delay: chrono::Duration) -> DateTime<Utc> {
        let factor = 1i64 << self.attempts.min(16);
        now + base_delay * factor as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_code_fallback_table() {
        assert_eq!(BusinessProcess::from_process_code("E23"), Some(BusinessProcess::MeteredData));
        assert_eq!(BusinessProcess::from_process_code("D18"), Some(BusinessProcess::PriceList));
        assert_eq!(BusinessProcess::from_process_code("D17"), Some(BusinessProcess::PriceLink));
        assert_eq!(BusinessProcess::from_process_code("ZZ"), None);
    }

    #[test]
    fn inbox_message_exhausts_after_five_attempts() {
        let mut msg = InboxMessage {
            id: Uuid::new_v4(),
            message_id: "m-1".into(),
            document_type: DocumentType::Notify,
            business_process: BusinessProcess::MeteredData,
            sender_id: "1234567890123".into(),
            receiver_id: "1234567890123".into(),
            payload: Value::Null,
            received_at: Utc::now(),
            is_processed: false,
            attempts: 0,
            last_error: None,
        };
        for _ in 0..5 {
            msg.record_failure("boom");
        }
        assert!(msg.exhausted());
    }
}
