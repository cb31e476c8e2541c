//! # Investment Core
//!
//! Entry point: telemetry, configuration, runtime, Ctrl+C shutdown.

use anyhow::{Context, Result};
use platform_runtime::{load_config, PlatformRuntime};
use platform_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let environment = telemetry.environment.clone();
    init_telemetry(telemetry).context("Failed to initialize telemetry")?;

    let config = load_config().context("Invalid configuration")?;
    if environment == "dev" {
        if let Err(e) = config.validate_for_production() {
            warn!("Not production ready: {}", e);
        }
    } else {
        config
            .validate_for_production()
            .context("Configuration rejected")?;
    }

    let runtime = PlatformRuntime::new(config);
    runtime.start().await?;

    info!("Investment core is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
