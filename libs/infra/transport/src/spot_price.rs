//! Inbound adapter for the spot-price provider feeding the SpotAddon
//! pricing model. Shares the same simulation fallback as the message hub:
//! with no credentials configured, the ingester simply has nothing to poll.

use crate::errors::TransportError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use settlement_core_money::UnitPrice;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Clone, Deserialize)]
pub struct SpotPriceQuote {
    pub bidding_area: String,
    pub timestamp: DateTime<Utc>,
    pub rate: UnitPrice,
}

#[async_trait::async_trait]
pub trait SpotPriceProvider: Send + Sync {
    async fn fetch(&self, bidding_area: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<SpotPriceQuote>, TransportError>;
}

pub struct HttpSpotPriceProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpotPriceProvider {
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
impl SpotPriceProvider for HttpSpotPriceProvider {
    #[instrument(skip(self))]
    async fn fetch(&self, bidding_area: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<SpotPriceQuote>, TransportError> {
        let url = format!(
            "{}/spot-prices?area={}&from={}&to={}",
            self.base_url,
            bidding_area,
            from.to_rfc3339(),
            to.to_rfc3339()
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::ServerRejection(format!("HTTP {}", response.status())));
        }

        Ok(response.json().await?)
    }
}

pub struct SimulationSpotPriceProvider;

#[async_trait::async_trait]
impl SpotPriceProvider for SimulationSpotPriceProvider {
    async fn fetch(&self, _bidding_area: &str, _from: DateTime<Utc>, _to: DateTime<Utc>) -> Result<Vec<SpotPriceQuote>, TransportError> {
        Ok(Vec::new())
    }
}
