//! # Bus Errors

use thiserror::Error;

/// Errors raised by the message bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Exchange queue is at capacity.
    #[error("Queue for publisher [{publisher_id}] is full ({capacity} messages)")]
    QueueFull {
        /// Exchange that refused the message.
        publisher_id: String,
        /// Configured capacity.
        capacity: usize,
    },

    /// Ack or nack for a delivery the bus does not know about.
    #[error("Unknown delivery tag {0}")]
    UnknownDeliveryTag(u64),

    /// Message content could not be (de)serialized.
    #[error("Invalid message content: {0}")]
    InvalidContent(String),

    /// The consumer has been closed.
    #[error("Consumer closed")]
    Closed,
}
