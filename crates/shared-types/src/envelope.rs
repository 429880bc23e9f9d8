//! # Blockchain Event Message
//!
//! Content of the bus message carrying one chain log. The publisher routes it
//! under `BLK.<topic0>` so consumers can subscribe per event signature.

use serde::{Deserialize, Serialize};

use crate::encoding::quantity;
use crate::entities::{EventPosition, RawLog};
use crate::errors::TypesError;

/// Routing key prefix for blockchain event messages.
pub const ROUTING_KEY_PREFIX: &str = "BLK.";

/// Message content published for every relevant chain log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainEventMessage {
    /// Contract that emitted the log.
    pub contract_address: String,
    /// ABI-encoded log data.
    pub data: String,
    /// Log topics; may be absent on older publishers.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Block number.
    #[serde(with = "quantity")]
    pub block_number: u64,
    /// Transaction index.
    #[serde(with = "quantity")]
    pub transaction_index: u64,
    /// Log index.
    #[serde(with = "quantity")]
    pub log_index: u64,
    /// Transaction hash.
    #[serde(default)]
    pub transaction_hash: String,
}

impl BlockchainEventMessage {
    /// Build the message for a raw log.
    pub fn from_log(log: &RawLog) -> Self {
        Self {
            contract_address: log.address.clone(),
            data: log.data.clone(),
            topics: log.topics.clone(),
            block_number: log.block_number,
            transaction_index: log.transaction_index,
            log_index: log.log_index,
            transaction_hash: log.transaction_hash.clone(),
        }
    }

    /// Routing key for a raw log: `BLK.<topic0>`.
    pub fn routing_key_for(log: &RawLog) -> Result<String, TypesError> {
        Ok(routing_key(log.topic0()?))
    }

    /// Position of the carried event.
    pub fn position(&self) -> EventPosition {
        EventPosition::new(self.block_number, self.transaction_index, self.log_index)
    }

    /// Rebuild the raw log. `topic0` is supplied by the consumer when the
    /// message itself does not carry topics.
    pub fn into_raw_log(self, topic0: Option<&str>) -> RawLog {
        let topics = match (self.topics.is_empty(), topic0) {
            (true, Some(topic)) => vec![topic.to_string()],
            _ => self.topics,
        };
        RawLog {
            address: self.contract_address,
            data: self.data,
            topics,
            block_number: self.block_number,
            transaction_index: self.transaction_index,
            log_index: self.log_index,
            transaction_hash: self.transaction_hash,
        }
    }
}

/// Build a routing key for an event signature topic.
pub fn routing_key(topic0: &str) -> String {
    format!("{}{}", ROUTING_KEY_PREFIX, topic0)
}

/// Extract the event signature topic from a routing key.
pub fn topic_from_routing_key(key: &str) -> Option<&str> {
    key.strip_prefix(ROUTING_KEY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> RawLog {
        RawLog {
            address: "0xAfDA406A236ec16d65ee2EB18c791Dfb48dd9a51".to_string(),
            data: "0x00".to_string(),
            topics: vec!["0xabc".to_string()],
            block_number: 23,
            transaction_index: 1,
            log_index: 4,
            transaction_hash: "0x69d5".to_string(),
        }
    }

    #[test]
    fn test_routing_key() {
        assert_eq!(
            BlockchainEventMessage::routing_key_for(&sample_log()).unwrap(),
            "BLK.0xabc"
        );
        assert_eq!(topic_from_routing_key("BLK.0xabc"), Some("0xabc"));
        assert_eq!(topic_from_routing_key("OTHER.0xabc"), None);
    }

    #[test]
    fn test_message_content_is_camel_case() {
        let message = BlockchainEventMessage::from_log(&sample_log());
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["contractAddress"], "0xAfDA406A236ec16d65ee2EB18c791Dfb48dd9a51");
        assert_eq!(value["blockNumber"], 23);
        assert_eq!(value["logIndex"], 4);
    }

    #[test]
    fn test_into_raw_log_fills_missing_topic() {
        let json = serde_json::json!({
            "contractAddress": "0x01",
            "data": "0x",
            "blockNumber": 5,
            "transactionIndex": 0,
            "logIndex": 1,
            "transactionHash": "0x02"
        });
        let message: BlockchainEventMessage = serde_json::from_value(json).unwrap();
        assert_eq!(message.position(), EventPosition::new(5, 0, 1));
        let log = message.into_raw_log(Some("0xabc"));
        assert_eq!(log.topics, vec!["0xabc".to_string()]);
        assert_eq!(log.address, "0x01");
    }
}
