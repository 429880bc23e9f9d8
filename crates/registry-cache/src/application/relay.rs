//! # Blockchain Event Relay
//!
//! Publishes registry contract logs from the chain onto the bus as
//! blockchain event messages, for deployments that run without an external
//! event-management service. Keeps its own block cursor: every pass reads
//! `(cursor, head]` and moves the cursor to `head` once all logs are
//! published.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use shared_bus::MessagePublisher;

use crate::config::RegistryCacheConfig;
use crate::domain::RegistryCacheError;
use crate::ports::{ChainRpc, EventsProcessorApi, ManagedService};

use super::periodic::PeriodicTask;

struct RelayWorker {
    chain: Arc<dyn ChainRpc>,
    processor: Arc<dyn EventsProcessorApi>,
    publisher: Arc<dyn MessagePublisher>,
    publisher_id: String,
    cursor: AtomicU64,
}

impl RelayWorker {
    async fn relay(&self) -> Result<usize, RegistryCacheError> {
        let head = self.chain.get_block_number().await?;
        let cursor = self.cursor.load(Ordering::SeqCst);
        if head <= cursor {
            return Ok(0);
        }

        let catalog = self.processor.deployed_contracts().await?;
        let logs = self.chain.get_past_logs(cursor + 1, head).await?;
        let mut published = 0;
        for log in logs.iter().filter(|log| catalog.is_allowed(&log.address)) {
            self.publisher.publish_log(&self.publisher_id, log).await?;
            published += 1;
        }
        self.cursor.store(head, Ordering::SeqCst);

        if published > 0 {
            debug!(from_block = cursor + 1, to_block = head, published, "Relayed registry logs");
        }
        Ok(published)
    }
}

/// Chain-to-bus relay.
pub struct BlockchainEventRelay {
    worker: Arc<RelayWorker>,
    interval: Duration,
    task: PeriodicTask,
}

impl BlockchainEventRelay {
    /// Create the relay with its cursor at block 0.
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        processor: Arc<dyn EventsProcessorApi>,
        publisher: Arc<dyn MessagePublisher>,
        config: &RegistryCacheConfig,
    ) -> Self {
        Self {
            worker: Arc::new(RelayWorker {
                chain,
                processor,
                publisher,
                publisher_id: config.publisher_id.clone(),
                cursor: AtomicU64::new(0),
            }),
            interval: config.relay_interval(),
            task: PeriodicTask::new("event-relay"),
        }
    }

    /// Last block relayed.
    pub fn cursor(&self) -> u64 {
        self.worker.cursor.load(Ordering::SeqCst)
    }

    /// Resume after `block`.
    pub fn set_cursor(&self, block: u64) {
        self.worker.cursor.store(block, Ordering::SeqCst);
    }

    /// Run one relay pass. Returns the number of messages published.
    pub async fn relay_once(&self) -> Result<usize, RegistryCacheError> {
        self.worker.relay().await
    }
}

#[async_trait]
impl ManagedService for BlockchainEventRelay {
    async fn start(&self) -> Result<(), RegistryCacheError> {
        let worker = Arc::clone(&self.worker);
        let started = self.task.start(self.interval, move || {
            let worker = Arc::clone(&worker);
            async move {
                if let Err(e) = worker.relay().await {
                    warn!(error = %e, "Relay pass failed");
                }
            }
        });
        if started {
            info!(cursor = self.cursor(), "Event relay started");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), RegistryCacheError> {
        if self.task.stop().await {
            info!(cursor = self.cursor(), "Event relay stopped");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.task.is_running()
    }
}
