//! ABI errors.

use thiserror::Error;

use crate::domain::RegistryCacheError;

/// Errors raised while parsing ABIs or decoding logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    /// Type string not supported by the decoder.
    #[error("Unsupported ABI type: {0}")]
    UnsupportedType(String),

    /// ABI JSON not in the expected shape.
    #[error("Malformed ABI: {0}")]
    MalformedAbi(String),

    /// Data ended before a value could be read.
    #[error("Data too short: need {needed} bytes at offset {offset}, have {available}")]
    OutOfBounds {
        /// Offset of the read.
        offset: usize,
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// A word did not hold a valid value of its type.
    #[error("Invalid {kind} value: {reason}")]
    InvalidValue {
        /// ABI type.
        kind: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The log carries fewer topics than the definition indexes.
    #[error("Log has {actual} topics, event {event} needs {expected}")]
    TopicCount {
        /// Event name.
        event: String,
        /// Topics required.
        expected: usize,
        /// Topics present.
        actual: usize,
    },

    /// topic0 is not known for the emitting contract.
    #[error("No event with topic {0}")]
    UnknownTopic(String),

    /// Decoded parameters did not match the expected event shape.
    #[error("Event {event} has unexpected shape: {reason}")]
    Shape {
        /// Event name.
        event: String,
        /// Mismatch detail.
        reason: String,
    },

    /// Log data is not valid hex.
    #[error("Invalid hex data: {0}")]
    InvalidHex(String),
}

impl From<AbiError> for RegistryCacheError {
    fn from(err: AbiError) -> Self {
        match err {
            AbiError::UnsupportedType(_) | AbiError::MalformedAbi(_) => {
                RegistryCacheError::Configuration(err.to_string())
            }
            other => RegistryCacheError::EventValidation(other.to_string()),
        }
    }
}
