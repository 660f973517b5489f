//! gRPC Bridge Companion Server
//!
//! Runs the in-memory host, sets up the bridge integration and serves its
//! WebSocket endpoint.

mod config;

use std::sync::Arc;

use anyhow::Result;
use bridge_api::{start_server, AppState};
use bridge_core::consts::{DOMAIN, NAME, VERSION};
use bridge_host::{ConfigEntry, Hass};
use grpc_bridge::GrpcBridge;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{config_path, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path(std::env::args().nth(1));
    let config = ServerConfig::load(path.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting {} {}", NAME, VERSION);

    let hass = Hass::new();
    let entry = hass
        .config_entries
        .add(ConfigEntry::new(DOMAIN, config.title.clone()));
    let bridge = Arc::new(GrpcBridge::new(hass, entry)?);
    bridge.setup_entry();

    let addr = config.bind_addr()?.to_string();
    let state = AppState::new(bridge.clone());
    tokio::select! {
        result = start_server(state, &addr, &config.websocket_path) => result?,
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down...");
        }
    }

    if !bridge.unload_entry().await {
        warn!("Integration did not unload cleanly");
    }
    Ok(())
}
