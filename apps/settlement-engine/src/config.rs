//! Environment-sourced configuration, read once at startup. Every knob has
//! a documented default so the engine runs in simulation mode against a
//! bare `DATABASE_URL` with nothing else set.

use std::env;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,

    /// Base URL of the external message hub. Absent → simulation mode:
    /// the dispatcher accepts every send without transmitting it, and the
    /// fetcher polls nothing.
    pub message_hub_base_url: Option<String>,
    pub message_hub_credential: Option<String>,

    /// Base URL of the day-ahead spot-price provider. Absent → simulation
    /// mode: the ingester fetches nothing.
    pub spot_price_base_url: Option<String>,
    pub spot_price_credential: Option<String>,

    pub http_timeout: Duration,

    pub inbox_poll_interval: Duration,
    pub inbox_batch_size: i64,
    pub inbox_max_attempts: i32,

    pub settlement_poll_interval: Duration,
    pub settlement_batch_size: i64,

    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: i64,
    pub outbox_max_retries: i32,
    pub outbox_base_backoff: chrono::Duration,

    pub spot_price_poll_interval: Duration,
    pub spot_price_bidding_areas: Vec<String>,
}

impl Config {
    /// Reads every setting from the environment. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env_parsed("PORT", 3000),

            message_hub_base_url: env::var("MESSAGE_HUB_BASE_URL").ok(),
            message_hub_credential: env::var("MESSAGE_HUB_CREDENTIAL").ok(),

            spot_price_base_url: env::var("SPOT_PRICE_BASE_URL").ok(),
            spot_price_credential: env::var("SPOT_PRICE_CREDENTIAL").ok(),

            http_timeout: Duration::from_secs(env_parsed("HTTP_TIMEOUT_SECONDS", 30)),

            inbox_poll_interval: Duration::from_secs(env_parsed("INBOX_POLL_INTERVAL_SECONDS", 5)),
            inbox_batch_size: env_parsed("INBOX_BATCH_SIZE", 50),
            inbox_max_attempts: env_parsed("INBOX_MAX_ATTEMPTS", 5),

            settlement_poll_interval: Duration::from_secs(env_parsed("SETTLEMENT_POLL_INTERVAL_SECONDS", 15)),
            settlement_batch_size: env_parsed("SETTLEMENT_BATCH_SIZE", 20),

            outbox_poll_interval: Duration::from_secs(env_parsed("OUTBOX_POLL_INTERVAL_SECONDS", 5)),
            outbox_batch_size: env_parsed("OUTBOX_BATCH_SIZE", 50),
            outbox_max_retries: env_parsed("OUTBOX_MAX_RETRIES", 8),
            outbox_base_backoff: chrono::Duration::seconds(env_parsed("OUTBOX_BASE_BACKOFF_SECONDS", 10)),

            spot_price_poll_interval: Duration::from_secs(env_parsed("SPOT_PRICE_POLL_INTERVAL_SECONDS", 3600)),
            spot_price_bidding_areas: env_or("SPOT_PRICE_BIDDING_AREAS", "DK1,DK2")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}
