//! # Cache Event Service
//!
//! Live consumer. Once the backfill reaches the head, new registry events
//! arrive as bus messages routed under `BLK.<topic0>`. Every tick pulls at
//! most one message, drops it if the watermark is already at or past its
//! position, and otherwise applies it through the events processor.
//!
//! A message is acked only after the event is committed or found to need no
//! commit (duplicate, or emitted by a contract outside the allow-list). On
//! any error the delivery is left unacked: later messages keep flowing and
//! the failed one returns to the queue when the consumer closes.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use registry_telemetry::{
    log_chain_event, MESSAGES_DUPLICATE, MESSAGES_PROCESSED, MESSAGES_RECEIVED, MESSAGE_FAILURES,
};
use shared_bus::{MessageConsumer, ReceivedMessage};
use shared_types::{topic_from_routing_key, BlockchainEventMessage};

use crate::config::RegistryCacheConfig;
use crate::domain::{CommitOutcome, RegistryCacheError, TickOutcome};
use crate::ports::{CacheStore, EventsProcessorApi, ManagedService};

use super::periodic::PeriodicTask;

/// Pulls and applies one message per call.
struct LiveWorker {
    processor: Arc<dyn EventsProcessorApi>,
    store: Arc<dyn CacheStore>,
    consumer: Arc<dyn MessageConsumer>,
    publisher_id: String,
    routing_keys: RwLock<Vec<String>>,
}

impl LiveWorker {
    async fn subscribe(&self) -> Result<usize, RegistryCacheError> {
        let catalog = self.processor.deployed_contracts().await?;
        let keys = catalog.routing_keys();
        let count = keys.len();
        *self.routing_keys.write().await = keys;
        Ok(count)
    }

    async fn tick(&self) -> Result<TickOutcome, RegistryCacheError> {
        let message = {
            let keys = self.routing_keys.read().await;
            self.consumer.get(&self.publisher_id, &keys).await?
        };
        let Some(message) = message else {
            return Ok(TickOutcome::Idle);
        };
        MESSAGES_RECEIVED.inc();

        match self.handle(&message).await {
            Ok(outcome) => {
                self.consumer.ack(&message).await?;
                Ok(outcome)
            }
            Err(e) => {
                MESSAGE_FAILURES.inc();
                error!(
                    routing_key = %message.routing_key,
                    delivery_tag = message.delivery_tag,
                    error = %e,
                    "Failed to process blockchain event message, leaving it unacked"
                );
                Ok(TickOutcome::Failed)
            }
        }
    }

    async fn handle(&self, message: &ReceivedMessage) -> Result<TickOutcome, RegistryCacheError> {
        let content: BlockchainEventMessage = message.content_as()?;
        let position = content.position();
        let topic = topic_from_routing_key(&message.routing_key);

        if let Some(topic) = topic {
            let catalog = self.processor.deployed_contracts().await?;
            if let Some(event) = catalog.event_for_topic(topic) {
                log_chain_event!(debug, "Blockchain event received", position, event = %event.name);
            }
        }

        match self.store.last_event_processed().await? {
            Some(watermark) if position <= watermark => {
                MESSAGES_DUPLICATE.inc();
                log_chain_event!(
                    debug,
                    "Event already processed, discarding",
                    position,
                    watermark = %watermark
                );
                return Ok(TickOutcome::Duplicate);
            }
            Some(_) => {}
            None => {
                error!("No last processed event found, processing message anyway");
            }
        }

        let processed = self.processor.process_event(content.into_raw_log(topic)).await?;
        if processed.outcome == CommitOutcome::Duplicate {
            MESSAGES_DUPLICATE.inc();
            return Ok(TickOutcome::Duplicate);
        }
        MESSAGES_PROCESSED.inc();
        Ok(TickOutcome::Processed(processed))
    }
}

/// Live consumer service.
pub struct CacheEventService {
    worker: Arc<LiveWorker>,
    polling_interval: Duration,
    task: PeriodicTask,
}

impl CacheEventService {
    /// Create the service. Nothing runs until [`ManagedService::start`].
    pub fn new(
        processor: Arc<dyn EventsProcessorApi>,
        store: Arc<dyn CacheStore>,
        consumer: Arc<dyn MessageConsumer>,
        config: &RegistryCacheConfig,
    ) -> Self {
        Self {
            worker: Arc::new(LiveWorker {
                processor,
                store,
                consumer,
                publisher_id: config.publisher_id.clone(),
                routing_keys: RwLock::new(Vec::new()),
            }),
            polling_interval: config.polling_interval(),
            task: PeriodicTask::new("live-consumer"),
        }
    }

    /// Run one tick by hand. Subscribes first if the routing keys are not
    /// built yet.
    pub async fn poll_once(&self) -> Result<TickOutcome, RegistryCacheError> {
        if self.worker.routing_keys.read().await.is_empty() {
            self.worker.subscribe().await?;
        }
        self.worker.tick().await
    }

    /// Stop and close the consumer, handing unacked deliveries back.
    pub async fn shutdown(&self) -> Result<(), RegistryCacheError> {
        self.stop().await?;
        self.worker.consumer.close().await?;
        Ok(())
    }
}

#[async_trait]
impl ManagedService for CacheEventService {
    async fn start(&self) -> Result<(), RegistryCacheError> {
        if self.is_running() {
            debug!("Live consumer already running");
            return Ok(());
        }

        let subscribed = self.worker.subscribe().await?;
        let worker = Arc::clone(&self.worker);
        let started = self.task.start(self.polling_interval, move || {
            let worker = Arc::clone(&worker);
            async move {
                if let Err(e) = worker.tick().await {
                    warn!(error = %e, "Live consumer tick failed");
                }
            }
        });

        if started {
            info!(
                publisher_id = %self.worker.publisher_id,
                routing_keys = subscribed,
                interval_ms = self.polling_interval.as_millis() as u64,
                "Live consumer started"
            );
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), RegistryCacheError> {
        if self.task.stop().await {
            info!("Live consumer stopped");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryCacheStore;
    use crate::application::EventsProcessor;
    use crate::ports::{MockChainRpc, MockContractArtifacts, MockEventsProcessor};
    use crate::test_utils::{hash32, node_of, RegistryLogFactory};
    use shared_bus::{InMemoryMessageBus, MessagePublisher};
    use shared_types::EventPosition;
    use std::sync::atomic::Ordering;

    const PUBLISHER: &str = "from-event-mgnt";

    struct Fixture {
        bus: InMemoryMessageBus,
        store: Arc<InMemoryCacheStore>,
        service: CacheEventService,
        logs: RegistryLogFactory,
    }

    fn fixture() -> Fixture {
        let logs = RegistryLogFactory::default();
        let bus = InMemoryMessageBus::new();
        let store = Arc::new(InMemoryCacheStore::new());
        let processor = Arc::new(EventsProcessor::new(
            Arc::new(MockChainRpc::new(0, vec![])),
            Arc::new(MockContractArtifacts::new(logs.contracts())),
            store.clone(),
        ));
        let service = CacheEventService::new(
            processor,
            store.clone(),
            Arc::new(bus.consumer("api-registry-consumer")),
            &RegistryCacheConfig::for_testing(),
        );
        Fixture {
            bus,
            store,
            service,
            logs,
        }
    }

    #[tokio::test]
    async fn test_idle_when_bus_empty() {
        let f = fixture();
        assert_eq!(f.service.poll_once().await.unwrap(), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_message_processed_and_acked() {
        let f = fixture();
        let log = f
            .logs
            .new_owner((3, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1));
        f.bus.publish_log(PUBLISHER, &log).await.unwrap();

        let outcome = f.service.poll_once().await.unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::Processed(ref p) if p.outcome == CommitOutcome::Written
        ));
        assert_eq!(f.bus.pending_count(PUBLISHER), 0);
        assert_eq!(f.bus.unacked_count(PUBLISHER), 0);
        assert!(f
            .store
            .find_by_node(&node_of(&hash32(0), &hash32(1)))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_duplicates_around_watermark() {
        let f = fixture();
        f.store
            .create_or_update_watermark(EventPosition::new(10, 2, 2))
            .await
            .unwrap();
        let node = hash32(5);
        for at in [(10, 2, 2), (10, 2, 1), (10, 1, 5), (9, 9, 9)] {
            f.bus
                .publish_log(PUBLISHER, &f.logs.transfer(at, &node, &f.logs.owner(2)))
                .await
                .unwrap();
            assert_eq!(f.service.poll_once().await.unwrap(), TickOutcome::Duplicate);
        }
        for at in [(10, 2, 3), (11, 0, 0)] {
            f.bus
                .publish_log(PUBLISHER, &f.logs.transfer(at, &node, &f.logs.owner(2)))
                .await
                .unwrap();
            assert!(matches!(
                f.service.poll_once().await.unwrap(),
                TickOutcome::Processed(_)
            ));
        }
        assert_eq!(
            f.store.last_event_processed().await.unwrap(),
            Some(EventPosition::new(11, 0, 0))
        );
    }

    #[tokio::test]
    async fn test_foreign_contract_message_is_acked_and_skipped() {
        let f = fixture();
        f.bus
            .publish_log(PUBLISHER, &f.logs.foreign((1, 0, 0)))
            .await
            .unwrap();
        f.bus
            .publish_log(
                PUBLISHER,
                &f.logs.new_owner((2, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1)),
            )
            .await
            .unwrap();

        assert!(matches!(
            f.service.poll_once().await.unwrap(),
            TickOutcome::Processed(ref p) if p.outcome == CommitOutcome::Skipped
        ));
        assert!(matches!(
            f.service.poll_once().await.unwrap(),
            TickOutcome::Processed(ref p) if p.outcome == CommitOutcome::Written
        ));
        assert_eq!(f.service.poll_once().await.unwrap(), TickOutcome::Idle);

        assert_eq!(f.store.member_count(), 1);
        assert_eq!(f.bus.pending_count(PUBLISHER), 0);
        assert_eq!(f.bus.unacked_count(PUBLISHER), 0);
    }

    #[tokio::test]
    async fn test_processing_failure_does_not_block_queue() {
        let logs = RegistryLogFactory::default();
        let bus = InMemoryMessageBus::new();
        let store = Arc::new(InMemoryCacheStore::new());
        let processor = Arc::new(MockEventsProcessor {
            catalog: Arc::new(crate::abi::EventCatalog::from_contracts(&logs.contracts()).unwrap()),
            ..Default::default()
        });
        processor.fail_events.store(true, Ordering::SeqCst);
        let service = CacheEventService::new(
            processor.clone(),
            store,
            Arc::new(bus.consumer("c")),
            &RegistryCacheConfig::for_testing(),
        );
        bus.publish_log(PUBLISHER, &logs.transfer((1, 0, 0), &hash32(1), &logs.owner(1)))
            .await
            .unwrap();
        bus.publish_log(PUBLISHER, &logs.transfer((2, 0, 0), &hash32(1), &logs.owner(2)))
            .await
            .unwrap();

        assert_eq!(service.poll_once().await.unwrap(), TickOutcome::Failed);
        assert_eq!(bus.pending_count(PUBLISHER), 1);
        assert_eq!(bus.unacked_count(PUBLISHER), 1);

        processor.fail_events.store(false, Ordering::SeqCst);
        assert!(matches!(
            service.poll_once().await.unwrap(),
            TickOutcome::Processed(_)
        ));
        assert_eq!(service.poll_once().await.unwrap(), TickOutcome::Idle);
        assert_eq!(processor.events.lock().len(), 1);
        assert_eq!(bus.pending_count(PUBLISHER), 0);
        assert_eq!(bus.unacked_count(PUBLISHER), 1);

        service.shutdown().await.unwrap();
        assert_eq!(bus.pending_count(PUBLISHER), 1);
        assert_eq!(bus.unacked_count(PUBLISHER), 0);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_halts() {
        let f = fixture();
        f.service.start().await.unwrap();
        f.service.start().await.unwrap();
        assert!(f.service.is_running());

        f.service.stop().await.unwrap();
        assert!(!f.service.is_running());
        f.service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_running_loop_consumes_messages() {
        let f = fixture();
        f.service.start().await.unwrap();
        f.bus
            .publish_log(
                PUBLISHER,
                &f.logs.new_owner((1, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1)),
            )
            .await
            .unwrap();

        for _ in 0..100 {
            if f.store.member_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        f.service.shutdown().await.unwrap();
        assert_eq!(f.store.member_count(), 1);
    }
}
