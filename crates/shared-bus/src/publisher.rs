//! # Message Publisher
//!
//! Publishing side of the bus and the in-memory exchange store shared with
//! consumers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use shared_types::{BlockchainEventMessage, RawLog};

use crate::consumer::InMemoryConsumer;
use crate::errors::BusError;
use crate::message::StoredMessage;
use crate::DEFAULT_QUEUE_CAPACITY;

/// Trait for publishing messages to the bus.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish `content` on the exchange of `publisher_id` under `routing_key`.
    async fn publish(
        &self,
        publisher_id: &str,
        routing_key: &str,
        content: serde_json::Value,
    ) -> Result<(), BusError>;

    /// Publish one chain log as a blockchain event message (`BLK.<topic0>`).
    async fn publish_log(&self, publisher_id: &str, log: &RawLog) -> Result<(), BusError> {
        let routing_key = BlockchainEventMessage::routing_key_for(log)
            .map_err(|e| BusError::InvalidContent(e.to_string()))?;
        let content = serde_json::to_value(BlockchainEventMessage::from_log(log))
            .map_err(|e| BusError::InvalidContent(e.to_string()))?;
        self.publish(publisher_id, &routing_key, content).await
    }
}

/// Queue state of one exchange.
#[derive(Default)]
pub(crate) struct Exchange {
    pub ready: VecDeque<StoredMessage>,
    pub unacked: HashMap<u64, StoredMessage>,
}

/// State shared between the bus handle and its consumers.
pub(crate) struct BusInner {
    pub exchanges: Mutex<HashMap<String, Exchange>>,
    pub capacity: usize,
    pub next_delivery_tag: AtomicU64,
    pub published: AtomicU64,
    pub acked: AtomicU64,
}

/// In-memory implementation of the message bus.
///
/// Suitable for single-process operation and tests; a broker-backed
/// deployment implements the same `MessagePublisher` / `MessageConsumer`
/// traits.
#[derive(Clone)]
pub struct InMemoryMessageBus {
    inner: Arc<BusInner>,
}

impl InMemoryMessageBus {
    /// Create a bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a bus with a per-exchange capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                exchanges: Mutex::new(HashMap::new()),
                capacity,
                next_delivery_tag: AtomicU64::new(1),
                published: AtomicU64::new(0),
                acked: AtomicU64::new(0),
            }),
        }
    }

    /// Open a consumer. Each consumer tracks its own unacked deliveries.
    #[must_use]
    pub fn consumer(&self, consumer_id: impl Into<String>) -> InMemoryConsumer {
        InMemoryConsumer::new(consumer_id.into(), Arc::clone(&self.inner))
    }

    /// Messages waiting for delivery on an exchange.
    #[must_use]
    pub fn pending_count(&self, publisher_id: &str) -> usize {
        self.inner
            .exchanges
            .lock()
            .get(publisher_id)
            .map_or(0, |exchange| exchange.ready.len())
    }

    /// Messages delivered but not yet acknowledged on an exchange.
    #[must_use]
    pub fn unacked_count(&self, publisher_id: &str) -> usize {
        self.inner
            .exchanges
            .lock()
            .get(publisher_id)
            .map_or(0, |exchange| exchange.unacked.len())
    }

    /// Total messages accepted.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Total messages acknowledged.
    #[must_use]
    pub fn messages_acked(&self) -> u64 {
        self.inner.acked.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn publish(
        &self,
        publisher_id: &str,
        routing_key: &str,
        content: serde_json::Value,
    ) -> Result<(), BusError> {
        let mut exchanges = self.inner.exchanges.lock();
        let exchange = exchanges.entry(publisher_id.to_string()).or_default();

        if exchange.ready.len() >= self.inner.capacity {
            warn!(
                publisher_id,
                routing_key,
                capacity = self.inner.capacity,
                "Exchange queue full, message refused"
            );
            return Err(BusError::QueueFull {
                publisher_id: publisher_id.to_string(),
                capacity: self.inner.capacity,
            });
        }

        exchange
            .ready
            .push_back(StoredMessage::new(routing_key.to_string(), content));
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        debug!(
            publisher_id,
            routing_key,
            queued = exchange.ready.len(),
            "Message published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_counts() {
        let bus = InMemoryMessageBus::new();
        bus.publish("pub", "BLK.0x01", json!({})).await.unwrap();
        bus.publish("pub", "BLK.0x02", json!({})).await.unwrap();
        bus.publish("other", "BLK.0x01", json!({})).await.unwrap();

        assert_eq!(bus.pending_count("pub"), 2);
        assert_eq!(bus.pending_count("other"), 1);
        assert_eq!(bus.pending_count("missing"), 0);
        assert_eq!(bus.messages_published(), 3);
    }

    #[tokio::test]
    async fn test_publish_refused_when_full() {
        let bus = InMemoryMessageBus::with_capacity(1);
        bus.publish("pub", "k", json!(1)).await.unwrap();
        let err = bus.publish("pub", "k", json!(2)).await.unwrap_err();
        assert_eq!(
            err,
            BusError::QueueFull {
                publisher_id: "pub".to_string(),
                capacity: 1
            }
        );
    }

    #[tokio::test]
    async fn test_publish_log_uses_topic_routing_key() {
        let bus = InMemoryMessageBus::new();
        let log = RawLog {
            address: "0x01".to_string(),
            data: "0x".to_string(),
            topics: vec!["0xabc".to_string()],
            block_number: 3,
            transaction_index: 0,
            log_index: 1,
            transaction_hash: "0x02".to_string(),
        };
        bus.publish_log("pub", &log).await.unwrap();

        let exchanges = bus.inner.exchanges.lock();
        let stored = exchanges["pub"].ready.front().unwrap();
        assert_eq!(stored.routing_key, "BLK.0xabc");
        assert_eq!(stored.content["contractAddress"], "0x01");
        assert_eq!(stored.content["blockNumber"], 3);
    }

    #[tokio::test]
    async fn test_publish_log_without_topic_fails() {
        let bus = InMemoryMessageBus::new();
        let log = RawLog {
            address: "0x01".to_string(),
            data: "0x".to_string(),
            topics: vec![],
            block_number: 3,
            transaction_index: 0,
            log_index: 1,
            transaction_hash: String::new(),
        };
        assert!(matches!(
            bus.publish_log("pub", &log).await,
            Err(BusError::InvalidContent(_))
        ));
    }
}
