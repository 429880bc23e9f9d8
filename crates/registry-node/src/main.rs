//! # api-registry Node
//!
//! Boots the registry cache: loads configuration from the environment,
//! wires the adapters, backfills the cache from the chain and serves the
//! operator API until Ctrl+C.
//!
//! ## Environment
//!
//! See [`NodeConfig::from_env`] for the cache variables and
//! `registry-telemetry` for the logging ones (`REGISTRY_LOG_LEVEL`,
//! `REGISTRY_JSON_LOGS`, ...).

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use registry_node::{NodeConfig, NodeRuntime};
use registry_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(&TelemetryConfig::from_env())
        .context("failed to initialise telemetry")?;

    let config = NodeConfig::from_env().context("failed to load configuration")?;
    info!(
        version = registry_node::VERSION,
        rpc_url = %config.rpc_url,
        bind = %config.http_bind_addr,
        persistent = config.cache_db_path.is_some(),
        "Starting api-registry node"
    );

    let listener = TcpListener::bind(config.http_bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind_addr))?;
    let runtime = Arc::new(NodeRuntime::new(config).context("failed to wire node")?);
    let _population = runtime.start();

    let mut server = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.serve(listener).await })
    };

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            runtime.shutdown().await;
            if let Ok(Err(e)) = server.await {
                error!(error = %e, "Operator API failed during shutdown");
            }
        }
        result = &mut server => {
            match result {
                Ok(Ok(())) => info!("Operator API stopped"),
                Ok(Err(e)) => error!(error = %e, "Operator API failed"),
                Err(e) => error!(error = %e, "Operator API task panicked"),
            }
            runtime.shutdown().await;
        }
    }

    Ok(())
}
