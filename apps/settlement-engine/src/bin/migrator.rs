//! Standalone schema migrator. `Db::connect` applies the schema as part of
//! connecting, so this binary exists only to run that step without also
//! starting the workers and the HTTP server.

use settlement_infra_db::Db;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    settlement_shared_telemetry::init("settlement-engine-migrator");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        match Db::connect(&database_url).await {
            Ok(_) => {
                info!("schema applied");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "schema migration failed");
                std::process::exit(1);
            }
        }
    })
}
