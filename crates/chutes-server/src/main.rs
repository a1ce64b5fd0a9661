//! Game server entry point.
//!
//! Loads configuration, builds the shared state, spawns the retention
//! sweeps, and serves both transports until Ctrl-C.

use std::path::Path;

use chutes_core::ChutesConfig;
use chutes_server::{AppState, server, sweeps};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "chutes.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("chutes-server starting");

    let config = load_config()?;
    info!(
        port = config.server.port,
        max_players = config.game.max_players,
        "configuration loaded"
    );

    let state = AppState::new(config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep_handles = sweeps::spawn(&state, &shutdown_rx);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {e}");
        }
        let _ = shutdown_tx.send(true);
    });

    server::start_server(state, shutdown_rx).await?;

    for handle in sweep_handles {
        let _ = handle.await;
    }
    info!("server stopped");
    Ok(())
}

/// Load from `CHUTES_CONFIG` if set, else `chutes.yaml` when present,
/// else defaults plus environment overrides.
fn load_config() -> anyhow::Result<ChutesConfig> {
    if let Ok(path) = std::env::var("CHUTES_CONFIG") {
        return Ok(ChutesConfig::from_file(Path::new(&path))?);
    }
    let default = Path::new(DEFAULT_CONFIG_PATH);
    if default.exists() {
        return Ok(ChutesConfig::from_file(default)?);
    }
    Ok(ChutesConfig::from_env())
}
