//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports and the operator API
//! controller.

pub mod api_handler;
pub mod artifacts;
pub mod json_rpc;
pub mod memory_store;
#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;
pub mod signer;

pub use api_handler::{ErrorResponse, PopulateRequest, RegistryCacheController};
pub use artifacts::{registry_contracts, FileContractArtifacts, StaticContractArtifacts};
pub use json_rpc::HttpChainRpc;
pub use memory_store::InMemoryCacheStore;
#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbCacheStore, RocksDbStoreConfig};
pub use signer::HttpSignerClient;
