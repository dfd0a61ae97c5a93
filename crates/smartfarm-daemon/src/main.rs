//! SmartFarm engine daemon.
//!
//! Configured entirely from the environment (see
//! [`smartfarm_core::config::env_vars`]); connects to the broker and runs
//! until SIGINT.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use smartfarm_broker::MqttTransport;
use smartfarm_core::EngineConfig;
use smartfarm_engine::Engine;
use smartfarm_storage::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = EngineConfig::from_env();
    info!(
        host = %config.broker.host,
        port = config.broker.port,
        client_id = %config.broker.client_id,
        tls = config.broker.tls.is_some(),
        "starting smartfarm engine"
    );

    let store = Arc::new(MemoryStore::new());
    let transport =
        Arc::new(MqttTransport::new(&config.broker).context("failed to build mqtt transport")?);
    let engine = Arc::new(Engine::new(config, store, transport));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(engine.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    runner.await.context("engine task panicked")?;
    Ok(())
}

fn init_logging() {
    // JSON format for container environments, compact text for development.
    let json_logging = std::env::var("SMARTFARM_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("smartfarm=info,smartfarmd=info"));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}
