//! # Registry Cache Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::RegistryCacheError;

/// Registry cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCacheConfig {
    /// Blocks per backfill chunk.
    pub prepopulation_chunk: u64,

    /// Live consumer polling interval in milliseconds.
    pub polling_interval_ms: u64,

    /// Relay polling interval in milliseconds.
    pub relay_interval_ms: u64,

    /// Timeout for chain RPC and signer calls, in seconds.
    pub rpc_timeout_secs: u64,

    /// Consumer id on the bus.
    pub consumer_id: String,

    /// Exchange the blockchain event messages are published on.
    pub publisher_id: String,

    /// `staticId` of the company running this node. Required for key
    /// verification.
    pub company_static_id: Option<String>,

    /// LMS nodes skip key verification.
    pub is_lms_node: bool,
}

impl Default for RegistryCacheConfig {
    fn default() -> Self {
        Self {
            prepopulation_chunk: 10_000,
            polling_interval_ms: 300,
            relay_interval_ms: 1_000,
            rpc_timeout_secs: 90,
            consumer_id: "api-registry-consumer".to_string(),
            publisher_id: "from-event-mgnt".to_string(),
            company_static_id: None,
            is_lms_node: false,
        }
    }
}

impl RegistryCacheConfig {
    /// Create a config for testing (short intervals).
    pub fn for_testing() -> Self {
        Self {
            prepopulation_chunk: 100,
            polling_interval_ms: 5,
            relay_interval_ms: 5,
            rpc_timeout_secs: 5,
            ..Self::default()
        }
    }

    /// Live consumer polling interval.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Relay polling interval.
    pub fn relay_interval(&self) -> Duration {
        Duration::from_millis(self.relay_interval_ms)
    }

    /// Chain RPC and signer timeout.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), RegistryCacheError> {
        if self.prepopulation_chunk == 0 {
            return Err(RegistryCacheError::Configuration(
                "prepopulation_chunk must be positive".to_string(),
            ));
        }
        if self.polling_interval_ms == 0 || self.relay_interval_ms == 0 {
            return Err(RegistryCacheError::Configuration(
                "polling intervals must be positive".to_string(),
            ));
        }
        if self.rpc_timeout_secs == 0 {
            return Err(RegistryCacheError::Configuration(
                "rpc_timeout_secs must be positive".to_string(),
            ));
        }
        if !self.is_lms_node
            && self
                .company_static_id
                .as_deref()
                .map_or(true, |id| id.trim().is_empty())
        {
            return Err(RegistryCacheError::Configuration(
                "company_static_id is required unless the node is an LMS node".to_string(),
            ));
        }
        Ok(())
    }
}
