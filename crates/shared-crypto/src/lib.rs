//! # Shared Crypto - Ethereum Hashing Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | Keccak-256 | Event signature topics |
//! | `address` | EIP-55 | Checksummed addresses, key-to-address |
//! | `namehash` | ENS | Registry node derivation |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod errors;
pub mod hashing;
pub mod namehash;

// Re-exports
pub use address::{
    address_from_public_key, addresses_equal, checksum_encode, parse_address,
    to_checksum_address,
};
pub use errors::CryptoError;
pub use hashing::{event_topic, keccak256, Hash, Keccak256Hasher};
pub use namehash::{label_hash, namehash, parse_hash, subnode, subnode_hex, ROOT_NODE};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
