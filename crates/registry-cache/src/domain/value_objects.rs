//! # Value Objects
//!
//! Results handed back by the processor, the store and the live consumer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of processing one block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// First block of the range.
    pub start_block: u64,
    /// Last block of the range.
    pub end_block: u64,
    /// Last block the cache now reflects.
    pub last_block_processed: u64,
    /// Chain head read after the batch.
    pub last_blockchain_block: u64,
    /// True when the range reached the head, so live consumption may start.
    pub service_started: bool,
    /// Events committed to the store.
    pub events_applied: usize,
    /// Logs from contracts outside the allow-list.
    pub logs_skipped: usize,
}

/// What applying one event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A member record was written.
    Written,
    /// No record was written; only the watermark moved.
    WatermarkOnly,
    /// The event is at or behind the watermark; nothing was committed.
    Duplicate,
    /// The log came from a contract outside the allow-list; nothing was committed.
    Skipped,
}

/// One event handled by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEvent {
    /// Event name.
    pub name: String,
    /// Store result.
    pub outcome: CommitOutcome,
}

/// Result of one live-consumer tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing on the bus.
    Idle,
    /// Message at or behind the watermark; acked without processing.
    Duplicate,
    /// Message processed and acked.
    Processed(ProcessedEvent),
    /// Processing failed; the delivery stays unacked until the consumer closes.
    Failed,
}

/// Product availability answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAvailability {
    /// The member subscribes to the product.
    pub is_available: bool,
}

/// A deployed contract whose events feed the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedContract {
    /// Contract name.
    pub name: String,
    /// Deployed address.
    pub address: String,
    /// JSON ABI.
    pub abi: Value,
}

/// Public half of the node's Ethereum key, from the blockchain signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthPublicKey {
    /// Account address.
    pub address: String,
    /// Uncompressed public key, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Public half of the node's RSA messaging key (JWK fields), from the
/// signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaPublicKey {
    /// Modulus.
    pub n: String,
    /// Exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// Key type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,
}
