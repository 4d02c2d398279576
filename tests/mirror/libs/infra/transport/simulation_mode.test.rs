use chrono::Utc;
use serde_json::json;
use settlement_domain_models::{BusinessProcess, DocumentType, OutboxMessage};
use settlement_infra_transport::message_hub::{DispatchOutcome, MessageHub, SimulationMessageHub};
use settlement_infra_transport::spot_price::{SimulationSpotPriceProvider, SpotPriceProvider};
use uuid::Uuid;

fn outbox_message() -> OutboxMessage {
    OutboxMessage {
        id: Uuid::new_v4(),
        document_type: DocumentType::Notify,
        business_process: BusinessProcess::MeteredData,
        sender_id: "5790000000000".into(),
        receiver_id: "5790000000001".into(),
        payload: json!({"gsrn": "571313110000012340"}),
        is_sent: false,
        attempts: 0,
        last_error: None,
        scheduled_for: Utc::now(),
        response: None,
    }
}

#[tokio::test]
async fn simulated_hub_accepts_every_send_without_transmitting() {
    let hub = SimulationMessageHub;
    let outcome = hub.send(&outbox_message()).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Accepted { response: None }));
}

#[tokio::test]
async fn simulated_hub_polls_nothing() {
    let hub = SimulationMessageHub;
    let batch = hub.poll_inbound(50).await.unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
async fn simulated_spot_price_provider_returns_no_quotes() {
    let provider = SimulationSpotPriceProvider;
    let now = Utc::now();
    let quotes = provider.fetch("DK1", now, now).await.unwrap();
    assert!(quotes.is_empty());
}
