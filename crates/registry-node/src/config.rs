//! # Node Configuration
//!
//! Everything the node reads from its environment. Registry cache settings
//! are folded into [`RegistryCacheConfig`]; the rest is wiring (URLs,
//! bind address, storage location).
//!
//! All values have defaults except `COMPANY_STATIC_ID`, which is required
//! unless `IS_LMS_NODE` is set.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use registry_cache::RegistryCacheConfig;
use registry_telemetry::parse_flag;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is present but cannot be parsed.
    #[error("{name} has invalid value [{value}]")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// The assembled configuration is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Registry cache settings.
    pub cache: RegistryCacheConfig,
    /// JSON-RPC endpoint of the chain node.
    pub rpc_url: String,
    /// Signer service (RSA messaging key).
    pub signer_base_url: String,
    /// Blockchain signer service (Ethereum key).
    pub blockchain_signer_base_url: String,
    /// Deployed contract artifacts file.
    pub artifacts_path: PathBuf,
    /// Operator API bind address.
    pub http_bind_addr: SocketAddr,
    /// RocksDB directory. `None` keeps members in memory.
    pub cache_db_path: Option<String>,
    /// Publish chain logs onto the bus from this node.
    pub relay_enabled: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cache: RegistryCacheConfig::default(),
            rpc_url: "http://localhost:8545".to_string(),
            signer_base_url: "http://api-signer".to_string(),
            blockchain_signer_base_url: "http://api-blockchain-signer".to_string(),
            artifacts_path: PathBuf::from("contracts.json"),
            http_bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cache_db_path: None,
            relay_enabled: true,
        }
    }
}

impl NodeConfig {
    /// Load configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `PREPOPULATION_CHUNK`: Blocks per backfill chunk (default: 10000)
    /// - `INTERNAL_MQ_POLLING_INTERVAL_MS`: Live consumer interval (default: 300)
    /// - `CONSUMER_ID`: Bus consumer id (default: api-registry-consumer)
    /// - `FROM_PUBLISHER_ID`: Blockchain event exchange (default: from-event-mgnt)
    /// - `COMPANY_STATIC_ID`: Company running this node
    /// - `IS_LMS_NODE`: Skip key verification (default: false)
    /// - `BLOCKCHAIN_RPC_URL`: Chain JSON-RPC endpoint (default: http://localhost:8545)
    /// - `RPC_TIMEOUT_SECS`: Chain and signer timeout (default: 90)
    /// - `API_SIGNER_BASE_URL`: RSA key service (default: http://api-signer)
    /// - `API_BLOCKCHAIN_SIGNER_BASE_URL`: Ethereum key service
    /// - `CONTRACT_ARTIFACTS_PATH`: Deployed contracts file (default: contracts.json)
    /// - `HTTP_BIND_ADDR`: Operator API address (default: 0.0.0.0:8080)
    /// - `CACHE_DB_PATH`: RocksDB directory (default: in-memory store)
    /// - `RELAY_ENABLED`: Run the chain-to-bus relay (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("PREPOPULATION_CHUNK") {
            config.cache.prepopulation_chunk = parse_number("PREPOPULATION_CHUNK", &v)?;
        }
        if let Some(v) = var("INTERNAL_MQ_POLLING_INTERVAL_MS") {
            config.cache.polling_interval_ms =
                parse_number("INTERNAL_MQ_POLLING_INTERVAL_MS", &v)?;
        }
        if let Some(v) = var("RPC_TIMEOUT_SECS") {
            config.cache.rpc_timeout_secs = parse_number("RPC_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("CONSUMER_ID") {
            config.cache.consumer_id = v;
        }
        if let Some(v) = var("FROM_PUBLISHER_ID") {
            config.cache.publisher_id = v;
        }
        config.cache.company_static_id = var("COMPANY_STATIC_ID");
        if let Some(v) = var("IS_LMS_NODE") {
            config.cache.is_lms_node = parse_flag(&v, false);
        }

        if let Some(v) = var("BLOCKCHAIN_RPC_URL") {
            config.rpc_url = v;
        }
        if let Some(v) = var("API_SIGNER_BASE_URL") {
            config.signer_base_url = v;
        }
        if let Some(v) = var("API_BLOCKCHAIN_SIGNER_BASE_URL") {
            config.blockchain_signer_base_url = v;
        }
        if let Some(v) = var("CONTRACT_ARTIFACTS_PATH") {
            config.artifacts_path = PathBuf::from(v);
        }
        if let Some(v) = var("HTTP_BIND_ADDR") {
            config.http_bind_addr = v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "HTTP_BIND_ADDR",
                value: v.clone(),
            })?;
        }
        config.cache_db_path = var("CACHE_DB_PATH");
        if let Some(v) = var("RELAY_ENABLED") {
            config.relay_enabled = parse_flag(&v, true);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the node cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        })
}
