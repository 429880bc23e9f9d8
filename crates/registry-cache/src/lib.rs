//! # Registry Cache
//!
//! Event-sourced cache of the company registry. The registry lives in two
//! contracts on chain (an ENS-style registry and a resolver); this crate
//! replays their events into a member store that the platform can query.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Pipeline
//!
//! 1. **Backfill**: clear the store, then process `[1, head]` in chunks.
//! 2. **Key verification**: the node's signer keys must be the ones the
//!    registry publishes for its company.
//! 3. **Gate**: member reads are refused until population completes.
//! 4. **Live**: consume `BLK.<topic0>` bus messages, drop anything at or
//!    behind the watermark, apply the rest.
//!
//! Every applied event commits its mutation and the watermark advance as
//! one store operation, so a crash never leaves the watermark ahead of the
//! data.
//!
//! ## Module Structure
//!
//! ```text
//! registry-cache/
//! ├── domain/          # MemberRecord, events, mutations, filters, errors
//! ├── abi/             # ABI types, log decoding, event catalog
//! ├── appliers/        # Event name -> mutation handlers
//! ├── ports/           # API traits (inbound) + dependency traits (outbound)
//! ├── application/     # Processor, backfill, live consumer, relay
//! ├── adapters/        # Stores, JSON-RPC, signers, artifacts, controller
//! └── config.rs        # RegistryCacheConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abi;
pub mod adapters;
pub mod application;
pub mod appliers;
pub mod config;
pub mod domain;
pub mod ports;
pub mod test_utils;

// Re-exports
pub use abi::{AbiError, EventCatalog};
pub use adapters::{
    ErrorResponse, FileContractArtifacts, HttpChainRpc, HttpSignerClient, InMemoryCacheStore,
    PopulateRequest, RegistryCacheController, StaticContractArtifacts,
};
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbCacheStore, RocksDbStoreConfig};
pub use application::{
    backfill_ranges, BlockchainEventRelay, CacheEventService, EventsProcessor, NodeKeyVerifier,
    RegistryCachePopulationService,
};
pub use appliers::{ApplierTable, ApplyContext};
pub use config::RegistryCacheConfig;
pub use domain::{
    AttributeKey, AttributeValue, BatchOutcome, CommitOutcome, DecodedEvent, DeployedContract,
    ErrorKind, KeyEntry, KeyList, MemberFilter, MemberMutation, MemberRecord, PopulationState,
    PopulationStateGate, ProcessedEvent, ProductAvailability, RegistryCacheError, RegistryEvent,
    TickOutcome,
};
pub use ports::{
    CacheStore, ChainRpc, ContractArtifacts, EthKeySigner, EventsProcessorApi, ManagedService,
    RegistryCachePopulation, RsaKeySigner,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
