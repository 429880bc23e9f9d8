//! # Shared Bus - Blockchain Event Message Bus
//!
//! Topic-routed queue with explicit acknowledgement, modelled on the AMQP
//! exchange the registry cache consumes from.
//!
//! ## Delivery Rules
//!
//! - One exchange per publisher id; messages are routed by routing key
//!   (`BLK.<topic0>` for chain events).
//! - `get` hands out at most one message and moves it to the unacked set.
//! - A message leaves the bus only on `ack`. `nack(requeue)` and `close`
//!   put unacked messages back at the head of the queue, flagged
//!   `redelivered`.
//!
//! ```text
//!  publisher ──publish(key)──→ [ exchange queue ] ──get(keys)──→ consumer
//!                                     ↑                             │
//!                                     └──────── nack / close ───────┤
//!                                                                   ↓
//!                                                                  ack
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod consumer;
pub mod errors;
pub mod message;
pub mod publisher;

// Re-export main types
pub use consumer::MessageConsumer;
pub use errors::BusError;
pub use message::ReceivedMessage;
pub use publisher::{InMemoryMessageBus, MessagePublisher};

/// Maximum messages held per exchange before publishers are refused.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
