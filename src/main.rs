//! Plug&Save daemon
//!
//! Runs the consumption simulator for the configured session until Ctrl+C.

use plugsave_lib::core::Config;
use plugsave_lib::simulation::ConsumptionSimulator;
use plugsave_lib::store::{self, StaticSession};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load or create configuration
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.general.log_level.as_str()),
    )
    .init();

    log::info!("Starting Plug&Save v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = load_error {
        log::warn!("Failed to load config, using defaults: {}", e);
    }
    config.validate()?;

    let store = store::open_configured(&config)?;
    let session = Arc::new(StaticSession::new(config.session.owner_id.clone()));
    if config.session.owner_id.trim().is_empty() {
        log::warn!("No session owner configured; cycles will be skipped");
    }

    let simulator = ConsumptionSimulator::new(store, session, &config);

    if config.simulation.enabled {
        tokio::time::sleep(Duration::from_millis(config.simulation.startup_delay_ms)).await;
        simulator.start();
    } else {
        log::info!("Simulation disabled in configuration");
    }

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    simulator.stop();

    Ok(())
}
