//! Shared application state: the repository set, the transport adapters
//! (live or simulated, chosen at construction time) and the
//! process-wide shutdown signal every worker observes at its sleep points.

use crate::config::Config;
use settlement_infra_db::repositories::{
    CustomerRepository, MarketRepository, MessagingRepository, MeteringRepository, PriceRepository,
    ProductRepository, SettlementRepository, TimeSeriesRepository,
};
use settlement_infra_db::Db;
use settlement_infra_transport::{
    HttpMessageHub, HttpSpotPriceProvider, MessageHub, SimulationMessageHub, SimulationSpotPriceProvider,
    SpotPriceProvider,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub metering: Arc<MeteringRepository>,
    pub customer: Arc<CustomerRepository>,
    pub product: Arc<ProductRepository>,
    pub price: Arc<PriceRepository>,
    pub time_series: Arc<TimeSeriesRepository>,
    pub market: Arc<MarketRepository>,
    pub messaging: Arc<MessagingRepository>,
    pub settlement: Arc<SettlementRepository>,
    pub message_hub: Arc<dyn MessageHub>,
    pub spot_price_provider: Arc<dyn SpotPriceProvider>,
    pub config: Arc<Config>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(db: Db, config: Config) -> Self {
        let pool = db.pool().clone();

        let message_hub: Arc<dyn MessageHub> = match (&config.message_hub_base_url, &config.message_hub_credential) {
            (Some(base_url), Some(credential)) => {
                info!("message hub configured, dispatching live");
                Arc::new(
                    HttpMessageHub::new(base_url.clone(), credential.clone(), config.http_timeout)
                        .expect("invalid message hub credential"),
                )
            }
            _ => {
                warn!("no message hub credentials configured, running in simulation mode");
                Arc::new(SimulationMessageHub)
            }
        };

        let spot_price_provider: Arc<dyn SpotPriceProvider> =
            match (&config.spot_price_base_url, &config.spot_price_credential) {
                (Some(base_url), Some(credential)) => {
                    info!("spot price provider configured, fetching live");
                    Arc::new(
                        HttpSpotPriceProvider::new(base_url.clone(), credential.clone(), config.http_timeout)
                            .expect("invalid spot price credential"),
                    )
                }
                _ => {
                    warn!("no spot price credentials configured, running in simulation mode");
                    Arc::new(SimulationSpotPriceProvider)
                }
            };

        Self {
            metering: Arc::new(MeteringRepository::new(pool.clone())),
            customer: Arc::new(CustomerRepository::new(pool.clone())),
            product: Arc::new(ProductRepository::new(pool.clone())),
            price: Arc::new(PriceRepository::new(pool.clone())),
            time_series: Arc::new(TimeSeriesRepository::new(pool.clone())),
            market: Arc::new(MarketRepository::new(pool.clone())),
            messaging: Arc::new(MessagingRepository::new(pool.clone())),
            settlement: Arc::new(SettlementRepository::new(pool)),
            message_hub,
            spot_price_provider,
            config: Arc::new(config),
            db,
            shutdown: CancellationToken::new(),
        }
    }
}
