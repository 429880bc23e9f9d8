//! # Ports Layer
//!
//! Inbound: what drivers call. Outbound: what the cache needs.

pub mod inbound;
pub mod outbound;

pub use inbound::{
    EventsProcessorApi, ManagedService, MockEventsProcessor, MockManagedService,
    RegistryCachePopulation,
};
pub use outbound::{
    CacheStore, ChainRpc, ContractArtifacts, EthKeySigner, MockChainRpc, MockContractArtifacts,
    MockEthSigner, MockRsaSigner, RsaKeySigner,
};
