//! # Messages

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::errors::BusError;

/// A message handed to a consumer by `get`.
///
/// The consumer must `ack` it (via the consumer it came from) once processed;
/// otherwise it will be redelivered.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// Unique id assigned at publish time.
    pub message_id: Uuid,
    /// Exchange (publisher id) the message was read from.
    pub publisher_id: String,
    /// Routing key used by the publisher.
    pub routing_key: String,
    /// JSON content.
    pub content: serde_json::Value,
    /// Delivery tag used for ack / nack.
    pub delivery_tag: u64,
    /// True if this message has been delivered before.
    pub redelivered: bool,
}

impl ReceivedMessage {
    /// Deserialize the content.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        serde_json::from_value(self.content.clone())
            .map_err(|e| BusError::InvalidContent(e.to_string()))
    }
}

/// Message as stored in an exchange queue.
#[derive(Debug, Clone)]
pub(crate) struct StoredMessage {
    pub message_id: Uuid,
    pub routing_key: String,
    pub content: serde_json::Value,
    pub redelivered: bool,
}

impl StoredMessage {
    pub(crate) fn new(routing_key: String, content: serde_json::Value) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            routing_key,
            content,
            redelivered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Content {
        block_number: u64,
    }

    fn message(content: serde_json::Value) -> ReceivedMessage {
        ReceivedMessage {
            message_id: Uuid::new_v4(),
            publisher_id: "from-event-mgnt".to_string(),
            routing_key: "BLK.0x01".to_string(),
            content,
            delivery_tag: 1,
            redelivered: false,
        }
    }

    #[test]
    fn test_content_as() {
        let msg = message(serde_json::json!({ "blockNumber": 7 }));
        assert_eq!(msg.content_as::<Content>().unwrap(), Content { block_number: 7 });
    }

    #[test]
    fn test_content_as_invalid() {
        let msg = message(serde_json::json!({ "other": true }));
        assert!(matches!(
            msg.content_as::<Content>(),
            Err(BusError::InvalidContent(_))
        ));
    }
}
