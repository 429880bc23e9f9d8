//! # Message Consumer
//!
//! Pull-based consumption: `get` returns at most one message and the caller
//! acks it when done. Nothing is removed from the bus until acked.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::BusError;
use crate::message::ReceivedMessage;
use crate::publisher::BusInner;

/// Trait for pulling messages from the bus.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Take the next message on the exchange of `publisher_id` whose routing
    /// key is one of `routing_keys`. Returns `None` when nothing matches.
    async fn get(
        &self,
        publisher_id: &str,
        routing_keys: &[String],
    ) -> Result<Option<ReceivedMessage>, BusError>;

    /// Acknowledge a delivered message, removing it from the bus.
    async fn ack(&self, message: &ReceivedMessage) -> Result<(), BusError>;

    /// Reject a delivered message. With `requeue` it goes back to the head of
    /// the queue, otherwise it is dropped.
    async fn nack(&self, message: &ReceivedMessage, requeue: bool) -> Result<(), BusError>;

    /// Close the consumer; every unacked delivery is requeued.
    async fn close(&self) -> Result<(), BusError>;
}

/// Consumer handle over an `InMemoryMessageBus`.
pub struct InMemoryConsumer {
    consumer_id: String,
    inner: Arc<BusInner>,
    /// (publisher id, delivery tag) of deliveries not yet settled.
    outstanding: Mutex<HashSet<(String, u64)>>,
    closed: AtomicBool,
}

impl InMemoryConsumer {
    pub(crate) fn new(consumer_id: String, inner: Arc<BusInner>) -> Self {
        Self {
            consumer_id,
            inner,
            outstanding: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Consumer identifier.
    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    /// Number of deliveries this consumer has not acked yet.
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.lock().len()
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    fn settle(&self, message: &ReceivedMessage, requeue: bool) -> Result<(), BusError> {
        let key = (message.publisher_id.clone(), message.delivery_tag);
        if !self.outstanding.lock().remove(&key) {
            return Err(BusError::UnknownDeliveryTag(message.delivery_tag));
        }

        let mut exchanges = self.inner.exchanges.lock();
        let exchange = exchanges
            .get_mut(&message.publisher_id)
            .ok_or(BusError::UnknownDeliveryTag(message.delivery_tag))?;
        let mut stored = exchange
            .unacked
            .remove(&message.delivery_tag)
            .ok_or(BusError::UnknownDeliveryTag(message.delivery_tag))?;

        if requeue {
            stored.redelivered = true;
            exchange.ready.push_front(stored);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for InMemoryConsumer {
    async fn get(
        &self,
        publisher_id: &str,
        routing_keys: &[String],
    ) -> Result<Option<ReceivedMessage>, BusError> {
        self.ensure_open()?;

        let mut exchanges = self.inner.exchanges.lock();
        let Some(exchange) = exchanges.get_mut(publisher_id) else {
            return Ok(None);
        };

        let Some(position) = exchange
            .ready
            .iter()
            .position(|m| routing_keys.iter().any(|k| k == &m.routing_key))
        else {
            return Ok(None);
        };

        let Some(stored) = exchange.ready.remove(position) else {
            return Ok(None);
        };
        let delivery_tag = self.inner.next_delivery_tag.fetch_add(1, Ordering::Relaxed);

        let message = ReceivedMessage {
            message_id: stored.message_id,
            publisher_id: publisher_id.to_string(),
            routing_key: stored.routing_key.clone(),
            content: stored.content.clone(),
            delivery_tag,
            redelivered: stored.redelivered,
        };
        exchange.unacked.insert(delivery_tag, stored);
        self.outstanding
            .lock()
            .insert((publisher_id.to_string(), delivery_tag));

        debug!(
            consumer_id = %self.consumer_id,
            publisher_id,
            routing_key = %message.routing_key,
            delivery_tag,
            redelivered = message.redelivered,
            "Message delivered"
        );
        Ok(Some(message))
    }

    async fn ack(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        self.settle(message, false)?;
        self.inner.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self, message: &ReceivedMessage, requeue: bool) -> Result<(), BusError> {
        self.settle(message, requeue)
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Requeue in reverse delivery order so the oldest ends up first.
        let mut pending: Vec<(String, u64)> = self.outstanding.lock().drain().collect();
        pending.sort_by(|a, b| b.1.cmp(&a.1));

        let mut exchanges = self.inner.exchanges.lock();
        let requeued = pending.len();
        for (publisher_id, tag) in pending {
            if let Some(exchange) = exchanges.get_mut(&publisher_id) {
                if let Some(mut stored) = exchange.unacked.remove(&tag) {
                    stored.redelivered = true;
                    exchange.ready.push_front(stored);
                }
            }
        }

        info!(consumer_id = %self.consumer_id, requeued, "Consumer closed");
        Ok(())
    }
}
