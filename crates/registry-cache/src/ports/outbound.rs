//! # Outbound Ports
//!
//! Traits for everything the cache depends on: the chain, the store, the
//! contract artifacts and the two signer services.

use async_trait::async_trait;

use shared_types::{EventPosition, RawLog};

use crate::domain::{
    CommitOutcome, DeployedContract, EthPublicKey, MemberFilter, MemberMutation, MemberRecord,
    RegistryCacheError, RsaPublicKey,
};

/// Blockchain JSON-RPC - outbound port.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// All logs in `[from_block, to_block]`, in chain order.
    async fn get_past_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RegistryCacheError>;

    /// Current head block number.
    async fn get_block_number(&self) -> Result<u64, RegistryCacheError>;
}

/// Member and watermark storage - outbound port.
///
/// `commit` applies a mutation and advances the watermark atomically. The
/// watermark never moves backwards.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Remove every member and the watermark.
    async fn clear_all(&self) -> Result<(), RegistryCacheError>;

    /// Member by primary key.
    async fn find_by_node(&self, node: &str) -> Result<Option<MemberRecord>, RegistryCacheError>;

    /// Member by parent node and label.
    async fn find_by_parent_and_label(
        &self,
        parent_node: &str,
        label: &str,
    ) -> Result<Option<MemberRecord>, RegistryCacheError>;

    /// Members matching `filter`, ordered by node.
    async fn get_members(
        &self,
        filter: &MemberFilter,
    ) -> Result<Vec<MemberRecord>, RegistryCacheError>;

    /// Position of the last applied event.
    async fn last_event_processed(&self) -> Result<Option<EventPosition>, RegistryCacheError>;

    /// Create or advance the watermark.
    async fn create_or_update_watermark(
        &self,
        position: EventPosition,
    ) -> Result<(), RegistryCacheError>;

    /// Apply `mutation` and advance the watermark to `position` in one step.
    async fn commit(
        &self,
        mutation: MemberMutation,
        position: EventPosition,
    ) -> Result<CommitOutcome, RegistryCacheError>;
}

/// Deployed contract addresses and ABIs - outbound port.
#[async_trait]
pub trait ContractArtifacts: Send + Sync {
    /// Every contract whose events feed the cache.
    async fn deployed_contracts(&self) -> Result<Vec<DeployedContract>, RegistryCacheError>;
}

/// Blockchain signer service - outbound port.
#[async_trait]
pub trait EthKeySigner: Send + Sync {
    /// The node's Ethereum public key.
    async fn get_eth_key(&self) -> Result<EthPublicKey, RegistryCacheError>;
}

/// Messaging signer service - outbound port.
#[async_trait]
pub trait RsaKeySigner: Send + Sync {
    /// The node's RSA messaging public key.
    async fn get_rsa_key(&self) -> Result<RsaPublicKey, RegistryCacheError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Mock chain serving a fixed set of logs.
#[derive(Default)]
pub struct MockChainRpc {
    /// Logs served by range.
    pub logs: Mutex<Vec<RawLog>>,
    /// Reported head.
    pub head: AtomicU64,
    /// Fail `get_past_logs`?
    pub fail_logs: AtomicBool,
    /// Fail `get_block_number`?
    pub fail_head: AtomicBool,
    /// Ranges requested.
    pub requests: Mutex<Vec<(u64, u64)>>,
    /// `get_block_number` calls.
    pub head_calls: AtomicUsize,
}

impl MockChainRpc {
    /// Mock with the given head and logs.
    pub fn new(head: u64, logs: Vec<RawLog>) -> Self {
        Self {
            logs: Mutex::new(logs),
            head: AtomicU64::new(head),
            ..Default::default()
        }
    }

    /// Append a log and raise the head to its block if needed.
    pub fn push_log(&self, log: RawLog) {
        self.head.fetch_max(log.block_number, Ordering::SeqCst);
        self.logs.lock().push(log);
    }
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    async fn get_past_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RegistryCacheError> {
        self.requests.lock().push((from_block, to_block));
        if self.fail_logs.load(Ordering::SeqCst) {
            return Err(RegistryCacheError::BlockchainConnection(
                "Mock failure".to_string(),
            ));
        }
        let mut logs: Vec<RawLog> = self
            .logs
            .lock()
            .iter()
            .filter(|log| log.block_number >= from_block && log.block_number <= to_block)
            .cloned()
            .collect();
        logs.sort_by_key(|log| log.position());
        Ok(logs)
    }

    async fn get_block_number(&self) -> Result<u64, RegistryCacheError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(RegistryCacheError::BlockchainConnection(
                "Mock failure".to_string(),
            ));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }
}

/// Mock artifacts returning a fixed contract list.
#[derive(Default)]
pub struct MockContractArtifacts {
    /// Contracts returned.
    pub contracts: Vec<DeployedContract>,
    /// Calls made.
    pub calls: AtomicUsize,
}

impl MockContractArtifacts {
    /// Mock returning `contracts`.
    pub fn new(contracts: Vec<DeployedContract>) -> Self {
        Self {
            contracts,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContractArtifacts for MockContractArtifacts {
    async fn deployed_contracts(&self) -> Result<Vec<DeployedContract>, RegistryCacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contracts.clone())
    }
}

/// Mock blockchain signer.
#[derive(Default)]
pub struct MockEthSigner {
    /// Key returned; `None` fails the call.
    pub key: Option<EthPublicKey>,
    /// Calls made.
    pub calls: AtomicUsize,
}

impl MockEthSigner {
    /// Mock returning a key with `address`.
    pub fn with_address(address: &str) -> Self {
        Self {
            key: Some(EthPublicKey {
                address: address.to_string(),
                public_key: None,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EthKeySigner for MockEthSigner {
    async fn get_eth_key(&self) -> Result<EthPublicKey, RegistryCacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.key
            .clone()
            .ok_or_else(|| RegistryCacheError::KeyVerification("Mock failure".to_string()))
    }
}

/// Mock messaging signer.
#[derive(Default)]
pub struct MockRsaSigner {
    /// Key returned; `None` fails the call.
    pub key: Option<RsaPublicKey>,
    /// Calls made.
    pub calls: AtomicUsize,
}

impl MockRsaSigner {
    /// Mock returning a key with modulus `n`.
    pub fn with_modulus(n: &str) -> Self {
        Self {
            key: Some(RsaPublicKey {
                n: n.to_string(),
                e: Some("AQAB".to_string()),
                kty: Some("RSA".to_string()),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RsaKeySigner for MockRsaSigner {
    async fn get_rsa_key(&self) -> Result<RsaPublicKey, RegistryCacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.key
            .clone()
            .ok_or_else(|| RegistryCacheError::KeyVerification("Mock failure".to_string()))
    }
}
