//! Outbound adapter to the external message hub. §4/§5 describe both
//! workers against an opaque transport: send / peek / dequeue, keyed by
//! idempotent message identifiers. `HttpMessageHub` is the live adapter;
//! `SimulationMessageHub` stands in when no credentials are configured
//! (§6 "Environment inputs" — dispatcher accepts all sends, fetcher polls
//! nothing).

use crate::errors::TransportError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use settlement_domain_models::OutboxMessage;
use std::time::Duration;
use tracing::{instrument, warn};

/// Raw inbound envelope as handed back by the hub, before classification.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct InboundEnvelope {
    pub message_id: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// §7's outbound-dispatch trichotomy: Accepted commits the send, Rejected
/// dead-letters it, TransientFailure leaves it for the next cycle.
#[derive(Debug)]
pub enum DispatchOutcome {
    Accepted { response: Option<Value> },
    Rejected { reason: String },
    TransientFailure,
}

#[async_trait::async_trait]
pub trait MessageHub: Send + Sync {
    async fn send(&self, message: &OutboxMessage) -> Result<DispatchOutcome, TransportError>;
    async fn poll_inbound(&self, max: usize) -> Result<Vec<InboundEnvelope>, TransportError>;
}

pub struct HttpMessageHub {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMessageHub {
    pub fn new(base_url: String, credential: String, timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| TransportError::Unauthorized)?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait::async_trait]
impl MessageHub for HttpMessageHub {
    #[instrument(skip(self, message))]
    async fn send(&self, message: &OutboxMessage) -> Result<DispatchOutcome, TransportError> {
        let url = format!("{}/messages", self.base_url);
        let result = self.client.post(&url).json(&message.payload).send().await;

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() || e.is_connect() => return Ok(DispatchOutcome::TransientFailure),
            Err(e) => return Err(e.into()),
        };

        match response.status() {
            s if s.is_success() => {
                let body: Option<Value> = response.json().await.ok();
                Ok(DispatchOutcome::Accepted { response: body })
            }
            s if s.is_server_error() => Ok(DispatchOutcome::TransientFailure),
            s => {
                let reason = format!("HTTP {s}");
                Ok(DispatchOutcome::Rejected { reason })
            }
        }
    }

    #[instrument(skip(self))]
    async fn poll_inbound(&self, max: usize) -> Result<Vec<InboundEnvelope>, TransportError> {
        let url = format!("{}/messages?limit={}", self.base_url, max);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::ServerRejection(format!("HTTP {}", response.status())));
        }

        Ok(response.json().await?)
    }
}

/// Dispatcher accepts every send as successful without contacting anything;
/// the fetcher always returns an empty batch. Used when `MESSAGE_HUB_TOKEN`
/// is unset so the engine still boots (and its workers still run) without
/// an external hub available.
pub struct SimulationMessageHub;

#[async_trait::async_trait]
impl MessageHub for SimulationMessageHub {
    async fn send(&self, _message: &OutboxMessage) -> Result<DispatchOutcome, TransportError> {
        warn!("message hub running in simulation mode: send accepted without transmission");
        Ok(DispatchOutcome::Accepted { response: None })
    }

    async fn poll_inbound(&self, _max: usize) -> Result<Vec<InboundEnvelope>, TransportError> {
        Ok(Vec::new())
    }
}
