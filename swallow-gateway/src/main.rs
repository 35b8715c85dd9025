//! Swallow Gateway - Main entry point.

use anyhow::Result;
use swallow_common::config::Config;
use swallow_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (file, then SWALLOW_* overrides)
    let config = Config::load_and_validate()?;

    // Initialize logging
    init_logging(&config.observability.log_level, &config.observability.log_format);

    tracing::info!("Swallow Gateway v{}", env!("CARGO_PKG_VERSION"));

    swallow_gateway::start_server(&config).await
}
