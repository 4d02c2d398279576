//! Composition root: connects the database, builds [`AppState`], spawns the
//! four workers and serves the HTTP API until the process is signalled to
//! shut down.

use crate::config::Config;
use crate::routes;
use crate::services::{inbox_router, outbox_dispatcher, settlement_worker, spot_price_ingester};
use crate::state::AppState;
use settlement_infra_db::Db;
use std::net::SocketAddr;
use tracing::{error, info, instrument};

pub struct Kernel {
    pub state: AppState,
    pub port: u16,
}

impl Kernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: Config) -> Self {
        let port = config.port;
        let db = Db::connect(&config.database_url).await.expect("database connection failed");
        Self { state: AppState::new(db, config), port }
    }

    pub async fn launch(self) {
        let Self { state, port } = self;

        tokio::spawn(inbox_router::run(state.clone()));
        tokio::spawn(settlement_worker::run(state.clone()));
        tokio::spawn(outbox_dispatcher::run(state.clone()));
        tokio::spawn(spot_price_ingester::run(state.clone()));

        let router = routes::build(state.clone());
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");
        info!(%addr, "settlement engine listening");

        let shutdown = state.shutdown.clone();
        let shutdown_signal = async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown.cancel();
        };

        if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal).await {
            error!(error = %e, "server error");
        }
    }
}
