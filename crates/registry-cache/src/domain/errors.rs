//! # Domain Errors
//!
//! One error type for the whole cache pipeline. Every variant maps to an
//! `ErrorKind`, which the operator boundary turns into a status and error
//! code.

use serde_json::Value;
use thiserror::Error;

/// Coarse error classification matched at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Chain RPC unreachable, timed out or returned an RPC error.
    BlockchainConnection,
    /// A log from an allowed contract could not be decoded.
    EventValidation,
    /// The cache store failed.
    DatabaseConnection,
    /// Reads refused until the backfill completes.
    CacheNotReady,
    /// Nothing matched the inquiry.
    ContentNotFound,
    /// Member filter rejected.
    InvalidFilter,
    /// Signer keys could not be fetched or did not match.
    KeyVerification,
    /// Message bus failure.
    Messaging,
    /// Invalid configuration or contract artifacts.
    Configuration,
}

impl ErrorKind {
    /// Stable error code reported to API callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorKind::BlockchainConnection => "EBLK01",
            ErrorKind::EventValidation | ErrorKind::InvalidFilter => "EVAL01",
            ErrorKind::DatabaseConnection => "EDAT01",
            ErrorKind::CacheNotReady => "ENRD01",
            ErrorKind::ContentNotFound => "ENF01",
            ErrorKind::KeyVerification | ErrorKind::Messaging | ErrorKind::Configuration => {
                "EINT01"
            }
        }
    }

    /// HTTP status for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BlockchainConnection
            | ErrorKind::DatabaseConnection
            | ErrorKind::CacheNotReady => 503,
            ErrorKind::ContentNotFound => 404,
            ErrorKind::InvalidFilter | ErrorKind::EventValidation => 422,
            ErrorKind::KeyVerification | ErrorKind::Messaging | ErrorKind::Configuration => 500,
        }
    }
}

/// Registry cache error types.
#[derive(Debug, Clone, Error)]
pub enum RegistryCacheError {
    /// Chain RPC failure.
    #[error("Blockchain connection error: {0}")]
    BlockchainConnection(String),

    /// Undecodable log or malformed event message.
    #[error("Event validation error: {0}")]
    EventValidation(String),

    /// Store failure.
    #[error("Database error: {0}")]
    DatabaseConnection(String),

    /// Cache population has not completed.
    #[error("Registry cache is not ready yet, population in progress")]
    CacheNotReady,

    /// Lookup found nothing.
    #[error("{0}")]
    ContentNotFound(String),

    /// Rejected member filter. `fields` carries per-field messages when the
    /// filter names unknown fields.
    #[error("{message}")]
    InvalidFilter {
        /// Human readable reason.
        message: String,
        /// Per-field validation messages.
        fields: Option<Value>,
    },

    /// Signer key lookup or comparison failed.
    #[error("Key verification failed: {0}")]
    KeyVerification(String),

    /// Message bus failure.
    #[error("Messaging error: {0}")]
    Messaging(String),

    /// Invalid configuration or artifacts.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RegistryCacheError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryCacheError::BlockchainConnection(_) => ErrorKind::BlockchainConnection,
            RegistryCacheError::EventValidation(_) => ErrorKind::EventValidation,
            RegistryCacheError::DatabaseConnection(_) => ErrorKind::DatabaseConnection,
            RegistryCacheError::CacheNotReady => ErrorKind::CacheNotReady,
            RegistryCacheError::ContentNotFound(_) => ErrorKind::ContentNotFound,
            RegistryCacheError::InvalidFilter { .. } => ErrorKind::InvalidFilter,
            RegistryCacheError::KeyVerification(_) => ErrorKind::KeyVerification,
            RegistryCacheError::Messaging(_) => ErrorKind::Messaging,
            RegistryCacheError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Shorthand for a filter error without field details.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        RegistryCacheError::InvalidFilter {
            message: message.into(),
            fields: None,
        }
    }

    /// The standard "nothing found" error.
    pub fn member_not_found() -> Self {
        RegistryCacheError::ContentNotFound("No member matching the inquiry was found.".to_string())
    }
}

impl From<shared_bus::BusError> for RegistryCacheError {
    fn from(err: shared_bus::BusError) -> Self {
        match err {
            shared_bus::BusError::InvalidContent(reason) => {
                RegistryCacheError::EventValidation(reason)
            }
            other => RegistryCacheError::Messaging(other.to_string()),
        }
    }
}

impl From<shared_types::TypesError> for RegistryCacheError {
    fn from(err: shared_types::TypesError) -> Self {
        RegistryCacheError::EventValidation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            RegistryCacheError::BlockchainConnection("down".into()).kind(),
            ErrorKind::BlockchainConnection
        );
        assert_eq!(RegistryCacheError::CacheNotReady.kind(), ErrorKind::CacheNotReady);
        assert_eq!(
            RegistryCacheError::invalid_filter("bad").kind(),
            ErrorKind::InvalidFilter
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::BlockchainConnection.status_code(), 503);
        assert_eq!(ErrorKind::DatabaseConnection.status_code(), 503);
        assert_eq!(ErrorKind::CacheNotReady.status_code(), 503);
        assert_eq!(ErrorKind::ContentNotFound.status_code(), 404);
        assert_eq!(ErrorKind::InvalidFilter.status_code(), 422);
        assert_eq!(ErrorKind::EventValidation.status_code(), 422);
        assert_eq!(ErrorKind::Messaging.status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorKind::InvalidFilter.error_code(), "EVAL01");
        assert_eq!(ErrorKind::CacheNotReady.error_code(), "ENRD01");
        assert_eq!(ErrorKind::ContentNotFound.error_code(), "ENF01");
        assert_eq!(ErrorKind::Configuration.error_code(), "EINT01");
    }

    #[test]
    fn test_bus_content_error_is_validation() {
        let err: RegistryCacheError = shared_bus::BusError::InvalidContent("x".into()).into();
        assert_eq!(err.kind(), ErrorKind::EventValidation);
        let err: RegistryCacheError = shared_bus::BusError::Closed.into();
        assert_eq!(err.kind(), ErrorKind::Messaging);
    }

    #[test]
    fn test_member_not_found_message() {
        assert_eq!(
            RegistryCacheError::member_not_found().to_string(),
            "No member matching the inquiry was found."
        );
    }
}
