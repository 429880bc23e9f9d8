//! # Core Chain Entities
//!
//! - `RawLog`: one contract log as returned by `eth_getLogs`.
//! - `EventPosition`: where a log sits in the chain; the ordering authority
//!   for the cache watermark.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::encoding::quantity;
use crate::errors::TypesError;

/// Position of an event in the chain.
///
/// Field order matters: the derived `Ord` compares block number first, then
/// transaction index, then log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventPosition {
    /// Block the event was mined in.
    #[serde(with = "quantity")]
    pub block_number: u64,
    /// Index of the transaction inside the block.
    #[serde(with = "quantity")]
    pub transaction_index: u64,
    /// Index of the log inside the block.
    #[serde(with = "quantity")]
    pub log_index: u64,
}

impl EventPosition {
    /// Create a position.
    pub const fn new(block_number: u64, transaction_index: u64, log_index: u64) -> Self {
        Self {
            block_number,
            transaction_index,
            log_index,
        }
    }

    /// True if `self` comes strictly after `other`.
    pub fn is_after(&self, other: &EventPosition) -> bool {
        self > other
    }
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.block_number, self.transaction_index, self.log_index
        )
    }
}

/// A contract log as returned by the chain RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Emitting contract address.
    pub address: String,
    /// ABI-encoded non-indexed parameters.
    pub data: String,
    /// topic0 is the event signature hash.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Block number.
    #[serde(with = "quantity")]
    pub block_number: u64,
    /// Transaction index in block.
    #[serde(with = "quantity")]
    pub transaction_index: u64,
    /// Log index in block.
    #[serde(with = "quantity")]
    pub log_index: u64,
    /// Hash of the emitting transaction.
    #[serde(default)]
    pub transaction_hash: String,
}

impl RawLog {
    /// Position of this log in the chain.
    pub fn position(&self) -> EventPosition {
        EventPosition::new(self.block_number, self.transaction_index, self.log_index)
    }

    /// The event signature topic.
    pub fn topic0(&self) -> Result<&str, TypesError> {
        self.topics
            .first()
            .map(String::as_str)
            .ok_or(TypesError::MissingTopic)
    }
}
