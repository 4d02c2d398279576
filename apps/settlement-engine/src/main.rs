use settlement_engine::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    settlement_shared_telemetry::init("settlement-engine");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let config = Config::from_env();
        let kernel = Kernel::ignite(config).await;
        kernel.launch().await;
    });

    Ok(())
}
