//! # Node Runtime
//!
//! Composition root. Builds every adapter and service from [`NodeConfig`],
//! then owns their lifecycle:
//!
//! ## Startup Sequence
//!
//! 1. Wire chain RPC, artifacts, store, bus and signers
//! 2. Spawn the population task (backfill, key verification, live consumer)
//! 3. Once populated, start the relay from the synced head
//! 4. Serve the operator API until shutdown
//!
//! ## Shutdown Sequence
//!
//! 1. Signal the HTTP server through the watch channel
//! 2. Stop the relay
//! 3. Stop the live consumer and close its bus consumer

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use registry_cache::{
    BlockchainEventRelay, CacheEventService, CacheStore, ChainRpc, ContractArtifacts,
    EthKeySigner, EventsProcessor, FileContractArtifacts, HttpChainRpc, HttpSignerClient,
    InMemoryCacheStore, ManagedService, NodeKeyVerifier, PopulationStateGate,
    RegistryCacheController, RegistryCacheError, RegistryCachePopulation,
    RegistryCachePopulationService, RsaKeySigner,
};
use shared_bus::InMemoryMessageBus;

use crate::config::NodeConfig;
use crate::routes::{build_router, AppState};

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Wiring or service failure.
    #[error(transparent)]
    Cache(#[from] RegistryCacheError),

    /// HTTP listener failure.
    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound adapters the runtime is built over.
pub struct NodePorts {
    /// Chain JSON-RPC.
    pub chain: Arc<dyn ChainRpc>,
    /// Deployed contract artifacts.
    pub artifacts: Arc<dyn ContractArtifacts>,
    /// Member store.
    pub store: Arc<dyn CacheStore>,
    /// Ethereum key service.
    pub eth_signer: Arc<dyn EthKeySigner>,
    /// RSA key service.
    pub rsa_signer: Arc<dyn RsaKeySigner>,
}

impl NodePorts {
    /// HTTP adapters and the configured store.
    pub fn from_config(config: &NodeConfig) -> Result<Self, RegistryCacheError> {
        let timeout = config.cache.rpc_timeout();
        Ok(Self {
            chain: Arc::new(HttpChainRpc::new(config.rpc_url.clone(), timeout)?),
            artifacts: Arc::new(FileContractArtifacts::new(config.artifacts_path.clone())),
            store: open_store(config)?,
            eth_signer: Arc::new(HttpSignerClient::new(
                config.blockchain_signer_base_url.clone(),
                timeout,
            )?),
            rsa_signer: Arc::new(HttpSignerClient::new(config.signer_base_url.clone(), timeout)?),
        })
    }
}

#[cfg(feature = "rocksdb")]
fn open_store(config: &NodeConfig) -> Result<Arc<dyn CacheStore>, RegistryCacheError> {
    use registry_cache::{RocksDbCacheStore, RocksDbStoreConfig};

    match &config.cache_db_path {
        Some(path) => {
            info!(path = %path, "Opening RocksDB cache store");
            let store = RocksDbCacheStore::open(RocksDbStoreConfig {
                path: path.clone(),
                ..RocksDbStoreConfig::default()
            })?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryCacheStore::new())),
    }
}

#[cfg(not(feature = "rocksdb"))]
fn open_store(config: &NodeConfig) -> Result<Arc<dyn CacheStore>, RegistryCacheError> {
    if config.cache_db_path.is_some() {
        return Err(RegistryCacheError::Configuration(
            "CACHE_DB_PATH requires the rocksdb feature".to_string(),
        ));
    }
    Ok(Arc::new(InMemoryCacheStore::new()))
}

/// The running node.
pub struct NodeRuntime {
    config: NodeConfig,
    bus: InMemoryMessageBus,
    live: Arc<CacheEventService>,
    relay: Option<Arc<BlockchainEventRelay>>,
    population: Arc<RegistryCachePopulationService>,
    controller: Arc<RegistryCacheController>,
    gate: Arc<PopulationStateGate>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Build the node with HTTP adapters.
    pub fn new(config: NodeConfig) -> Result<Self, RuntimeError> {
        let ports = NodePorts::from_config(&config)?;
        Self::with_ports(config, ports)
    }

    /// Build the node over the given adapters.
    pub fn with_ports(config: NodeConfig, ports: NodePorts) -> Result<Self, RuntimeError> {
        config.cache.validate()?;
        let NodePorts {
            chain,
            artifacts,
            store,
            eth_signer,
            rsa_signer,
        } = ports;

        let bus = InMemoryMessageBus::new();
        let gate = Arc::new(PopulationStateGate::new());

        let processor = Arc::new(EventsProcessor::new(
            Arc::clone(&chain),
            artifacts,
            Arc::clone(&store),
        ));

        let live = Arc::new(CacheEventService::new(
            processor.clone(),
            Arc::clone(&store),
            Arc::new(bus.consumer(config.cache.consumer_id.clone())),
            &config.cache,
        ));

        let relay = config.relay_enabled.then(|| {
            Arc::new(BlockchainEventRelay::new(
                Arc::clone(&chain),
                processor.clone(),
                Arc::new(bus.clone()),
                &config.cache,
            ))
        });

        let mut population = RegistryCachePopulationService::new(
            processor.clone(),
            Arc::clone(&store),
            chain,
            live.clone(),
            Arc::clone(&gate),
            &config.cache,
        );
        if let Some(static_id) = config.cache.company_static_id.clone() {
            if !config.cache.is_lms_node {
                population = population.with_key_verifier(NodeKeyVerifier::new(
                    Arc::clone(&store),
                    eth_signer,
                    rsa_signer,
                    static_id,
                ));
            }
        }

        let controller = Arc::new(RegistryCacheController::new(
            processor,
            store,
            live.clone(),
            Arc::clone(&gate),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            bus,
            live,
            relay,
            population: Arc::new(population),
            controller,
            gate,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Spawn the population task. Resolves to `true` once the cache is
    /// populated, verified and consuming live events.
    pub fn start(&self) -> JoinHandle<bool> {
        info!(
            consumer_id = %self.config.cache.consumer_id,
            publisher_id = %self.config.cache.publisher_id,
            lms = self.config.cache.is_lms_node,
            relay = self.relay.is_some(),
            "Starting registry cache population"
        );

        let population = Arc::clone(&self.population);
        let relay = self.relay.clone();
        tokio::spawn(async move {
            match population.clear_populate_and_start_service().await {
                Ok(true) => {
                    if let Some(relay) = relay {
                        relay.set_cursor(population.synced_head());
                        if let Err(e) = relay.start().await {
                            error!(error = %e, "Failed to start event relay");
                        }
                    }
                    info!(head = population.synced_head(), "Registry cache ready");
                    true
                }
                Ok(false) => {
                    warn!("Registry cache population did not complete, members stay unavailable");
                    false
                }
                Err(e) => {
                    error!(error = %e, "Registry cache population failed");
                    false
                }
            }
        })
    }

    /// Serve the operator API on `listener` until [`shutdown`](Self::shutdown).
    pub async fn serve(&self, listener: TcpListener) -> Result<(), RuntimeError> {
        let router = build_router(
            AppState {
                controller: Arc::clone(&self.controller),
                gate: Arc::clone(&self.gate),
            },
            self.config.cache.rpc_timeout(),
        );
        info!(addr = %listener.local_addr()?, "Operator API listening");

        let mut shutdown_rx = self.shutdown_rx.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await?;
        Ok(())
    }

    /// Stop the HTTP server, the relay and the live consumer.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        if let Some(relay) = &self.relay {
            if let Err(e) = relay.stop().await {
                warn!(error = %e, "Failed to stop event relay");
            }
        }
        if let Err(e) = self.live.shutdown().await {
            warn!(error = %e, "Failed to stop live consumer");
        }

        info!("Shutdown complete");
    }

    /// Operator controller.
    pub fn controller(&self) -> Arc<RegistryCacheController> {
        Arc::clone(&self.controller)
    }

    /// Read gate.
    pub fn gate(&self) -> Arc<PopulationStateGate> {
        Arc::clone(&self.gate)
    }

    /// Live consumer.
    pub fn live(&self) -> Arc<CacheEventService> {
        Arc::clone(&self.live)
    }

    /// Chain-to-bus relay, when enabled.
    pub fn relay(&self) -> Option<Arc<BlockchainEventRelay>> {
        self.relay.clone()
    }

    /// The node's message bus.
    pub fn bus(&self) -> &InMemoryMessageBus {
        &self.bus
    }
}
