//! # Inbound Ports
//!
//! What the cache offers to its drivers: the operator API, the backfill
//! coordinator and the live consumer loop.

use async_trait::async_trait;
use std::sync::Arc;

use shared_types::RawLog;

use crate::abi::EventCatalog;
use crate::domain::{BatchOutcome, ProcessedEvent, RegistryCacheError};

/// Fetch, decode and apply registry events.
#[async_trait]
pub trait EventsProcessorApi: Send + Sync {
    /// Process every log in `[from_block, to_block]`.
    async fn process_events_batch(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<BatchOutcome, RegistryCacheError>;

    /// Decode and apply exactly one log (live path).
    async fn process_event(&self, log: RawLog) -> Result<ProcessedEvent, RegistryCacheError>;

    /// The deployed contract catalog, resolved once and cached.
    async fn deployed_contracts(&self) -> Result<Arc<EventCatalog>, RegistryCacheError>;
}

/// A background service with a start/stop lifecycle.
#[async_trait]
pub trait ManagedService: Send + Sync {
    /// Start the service. Starting a running service is a no-op.
    async fn start(&self) -> Result<(), RegistryCacheError>;

    /// Stop scheduling new work. Work in flight finishes.
    async fn stop(&self) -> Result<(), RegistryCacheError>;

    /// True while running.
    fn is_running(&self) -> bool;
}

/// Full cache rebuild.
#[async_trait]
pub trait RegistryCachePopulation: Send + Sync {
    /// Clear, backfill to head, verify node keys, open the read gate and
    /// start live consumption. `Ok(false)` when any step before the gate
    /// fails.
    async fn clear_populate_and_start_service(&self) -> Result<bool, RegistryCacheError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock events processor. Records every call.
pub struct MockEventsProcessor {
    /// Ranges passed to `process_events_batch`.
    pub batches: Mutex<Vec<(u64, u64)>>,
    /// Logs passed to `process_event`.
    pub events: Mutex<Vec<RawLog>>,
    /// Head reported in batch outcomes.
    pub head: u64,
    /// Fail `process_events_batch` on this call index (0-based).
    pub fail_batch_at: Option<usize>,
    /// Fail every `process_event`.
    pub fail_events: AtomicBool,
    /// Catalog returned by `deployed_contracts`.
    pub catalog: Arc<EventCatalog>,
}

impl Default for MockEventsProcessor {
    fn default() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            head: 0,
            fail_batch_at: None,
            fail_events: AtomicBool::new(false),
            catalog: Arc::new(EventCatalog::default()),
        }
    }
}

#[async_trait]
impl EventsProcessorApi for MockEventsProcessor {
    async fn process_events_batch(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<BatchOutcome, RegistryCacheError> {
        let mut batches = self.batches.lock();
        if self.fail_batch_at == Some(batches.len()) {
            batches.push((from_block, to_block));
            return Err(RegistryCacheError::BlockchainConnection(
                "Mock failure".to_string(),
            ));
        }
        batches.push((from_block, to_block));
        Ok(BatchOutcome {
            start_block: from_block,
            end_block: to_block,
            last_block_processed: to_block,
            last_blockchain_block: self.head,
            service_started: to_block >= self.head,
            events_applied: 0,
            logs_skipped: 0,
        })
    }

    async fn process_event(&self, log: RawLog) -> Result<ProcessedEvent, RegistryCacheError> {
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(RegistryCacheError::DatabaseConnection(
                "Mock failure".to_string(),
            ));
        }
        self.events.lock().push(log);
        Ok(ProcessedEvent {
            name: "Mock".to_string(),
            outcome: crate::domain::CommitOutcome::Written,
        })
    }

    async fn deployed_contracts(&self) -> Result<Arc<EventCatalog>, RegistryCacheError> {
        Ok(Arc::clone(&self.catalog))
    }
}

/// Mock managed service counting lifecycle calls.
#[derive(Default)]
pub struct MockManagedService {
    /// Successful and failed `start` calls.
    pub starts: AtomicUsize,
    /// `stop` calls.
    pub stops: AtomicUsize,
    /// Fail `start`?
    pub should_fail: bool,
    /// Fail `stop`?
    pub should_fail_stop: bool,
    running: AtomicBool,
}

impl MockManagedService {
    /// Mock whose `start` fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Running mock whose `stop` fails.
    pub fn failing_stop() -> Self {
        Self {
            should_fail_stop: true,
            running: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Number of `start` calls.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManagedService for MockManagedService {
    async fn start(&self) -> Result<(), RegistryCacheError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(RegistryCacheError::Messaging("Mock failure".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), RegistryCacheError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_stop {
            return Err(RegistryCacheError::Messaging("Mock failure".to_string()));
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_processor_fails_on_requested_batch() {
        let processor = MockEventsProcessor {
            head: 100,
            fail_batch_at: Some(1),
            ..Default::default()
        };
        assert!(processor.process_events_batch(1, 50).await.is_ok());
        assert!(processor.process_events_batch(51, 100).await.is_err());
        assert_eq!(processor.batches.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_service_lifecycle() {
        let service = MockManagedService::default();
        service.start().await.unwrap();
        assert!(service.is_running());
        service.stop().await.unwrap();
        assert!(!service.is_running());
        assert!(MockManagedService::failing().start().await.is_err());
    }
}
