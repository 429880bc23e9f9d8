//! # Shared Types Crate
//!
//! Value types that cross crate boundaries in the registry cache workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: a chain log has one shape (`RawLog`) whether it
//!   arrives from JSON-RPC or from the message bus.
//! - **Total Order**: every applied event is placed by its `EventPosition`,
//!   compared lexicographically on (block, transaction, log).
//! - **Lenient Quantities**: block and index numbers are accepted both as JSON
//!   numbers and as `0x`-prefixed hex quantities.

pub mod encoding;
pub mod entities;
pub mod envelope;
pub mod errors;

pub use encoding::{bytes_to_hex, hex_to_bytes, parse_quantity, to_quantity};
pub use entities::*;
pub use envelope::{routing_key, topic_from_routing_key, BlockchainEventMessage, ROUTING_KEY_PREFIX};
pub use errors::*;
