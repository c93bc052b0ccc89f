//! Validator Alerting Daemon - Main Entry Point

use anyhow::Context;
use api::settings::Settings;
use api::{chain_statuses, init_logging, run};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let settings = Settings::load(config_path.as_deref()).context("loading configuration")?;
    init_logging(settings.log_format);

    info!("=== valwatch v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Monitoring {} chains...", settings.chains.len());

    let statuses = chain_statuses(&settings);
    run(settings, statuses).await
}
