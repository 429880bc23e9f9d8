//! # Registry Cache Population
//!
//! Full rebuild of the cache: clear, backfill from block 1 to the chain
//! head in fixed-size chunks, verify the node keys, open the read gate and
//! hand over to the live consumer.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use registry_telemetry::BACKFILL_CHUNKS;

use crate::config::RegistryCacheConfig;
use crate::domain::{PopulationState, PopulationStateGate, RegistryCacheError};
use crate::ports::{
    CacheStore, ChainRpc, EventsProcessorApi, ManagedService, RegistryCachePopulation,
};

use super::key_verification::NodeKeyVerifier;

/// Block ranges covering `[1, head]`.
///
/// The first range is `[1, min(chunk, head)]`; every following range starts
/// one block after the previous one and ends at `min(from + chunk, head)`.
/// A head of 0 yields no range.
pub fn backfill_ranges(head: u64, chunk: u64) -> Vec<(u64, u64)> {
    let chunk = chunk.max(1);
    let mut ranges = Vec::new();
    if head == 0 {
        return ranges;
    }
    let mut to = chunk.min(head);
    ranges.push((1, to));
    while to < head {
        let from = to + 1;
        to = from.saturating_add(chunk).min(head);
        ranges.push((from, to));
    }
    ranges
}

/// Backfill coordinator.
pub struct RegistryCachePopulationService {
    processor: Arc<dyn EventsProcessorApi>,
    store: Arc<dyn CacheStore>,
    chain: Arc<dyn ChainRpc>,
    live: Arc<dyn ManagedService>,
    gate: Arc<PopulationStateGate>,
    verifier: Option<NodeKeyVerifier>,
    chunk_size: u64,
    is_lms_node: bool,
    synced_head: AtomicU64,
    run_lock: Mutex<()>,
}

impl RegistryCachePopulationService {
    /// Create the coordinator. Key verification must be attached with
    /// [`with_key_verifier`](Self::with_key_verifier) unless the node is an
    /// LMS node.
    pub fn new(
        processor: Arc<dyn EventsProcessorApi>,
        store: Arc<dyn CacheStore>,
        chain: Arc<dyn ChainRpc>,
        live: Arc<dyn ManagedService>,
        gate: Arc<PopulationStateGate>,
        config: &RegistryCacheConfig,
    ) -> Self {
        Self {
            processor,
            store,
            chain,
            live,
            gate,
            verifier: None,
            chunk_size: config.prepopulation_chunk,
            is_lms_node: config.is_lms_node,
            synced_head: AtomicU64::new(0),
            run_lock: Mutex::new(()),
        }
    }

    /// Attach the node key verifier.
    pub fn with_key_verifier(mut self, verifier: NodeKeyVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Head reached by the last population that passed key verification
    /// (0 before any).
    pub fn synced_head(&self) -> u64 {
        self.synced_head.load(Ordering::SeqCst)
    }

    /// Read gate shared with the query side.
    pub fn gate(&self) -> Arc<PopulationStateGate> {
        Arc::clone(&self.gate)
    }

    async fn backfill(&self) -> Result<u64, RegistryCacheError> {
        self.store.clear_all().await?;
        let head = self.chain.get_block_number().await?;
        let ranges = backfill_ranges(head, self.chunk_size);
        info!(head, chunks = ranges.len(), chunk_size = self.chunk_size, "Starting backfill");

        for (from_block, to_block) in ranges {
            match self.processor.process_events_batch(from_block, to_block).await {
                Ok(outcome) => {
                    BACKFILL_CHUNKS.with_label_values(&["ok"]).inc();
                    info!(
                        from_block,
                        to_block,
                        events = outcome.events_applied,
                        "Backfill chunk processed"
                    );
                }
                Err(e) => {
                    BACKFILL_CHUNKS.with_label_values(&["failed"]).inc();
                    return Err(e);
                }
            }
        }
        Ok(head)
    }

    async fn verify_keys(&self) -> Result<bool, RegistryCacheError> {
        if self.is_lms_node {
            info!("LMS node, skipping key verification");
            return Ok(true);
        }
        match &self.verifier {
            Some(verifier) => verifier.verify().await,
            None => Err(RegistryCacheError::Configuration(
                "key verification is not configured".to_string(),
            )),
        }
    }
}

#[async_trait]
impl RegistryCachePopulation for RegistryCachePopulationService {
    async fn clear_populate_and_start_service(&self) -> Result<bool, RegistryCacheError> {
        let _run = self.run_lock.lock().await;

        self.gate.set(PopulationState::InProgress);
        if self.live.is_running() {
            if let Err(e) = self.live.stop().await {
                error!(error = %e, "Failed to stop live consumer before population");
                return Ok(false);
            }
        }

        let head = match self.backfill().await {
            Ok(head) => head,
            Err(e) => {
                error!(error = %e, "Cache population failed");
                return Ok(false);
            }
        };

        match self.verify_keys().await {
            Ok(true) => self.synced_head.store(head, Ordering::SeqCst),
            Ok(false) => {
                warn!("Node keys do not match the registry, cache stays closed");
                return Ok(false);
            }
            Err(e) => {
                error!(error = %e, "Node key verification failed");
                return Ok(false);
            }
        }

        self.gate.set(PopulationState::Complete);
        info!(head, "Cache populated");

        self.live.start().await?;
        Ok(true)
    }
}
