//! # Shared Error Types

use thiserror::Error;

/// Errors raised while parsing chain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// A hex string could not be decoded.
    #[error("Invalid hex string [{value}]: {reason}")]
    InvalidHex {
        /// Offending input.
        value: String,
        /// Decoder message.
        reason: String,
    },

    /// A numeric quantity was neither a JSON number nor a hex quantity.
    #[error("Invalid quantity [{0}]")]
    InvalidQuantity(String),

    /// A log is missing its first topic (event signature).
    #[error("Log has no topics")]
    MissingTopic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_hex_message() {
        let err = TypesError::InvalidHex {
            value: "0xzz".to_string(),
            reason: "bad char".to_string(),
        };
        assert!(err.to_string().contains("0xzz"));
    }
}
