//! Test utilities for the registry cache.
//!
//! Builds ABI-encoded registry and resolver logs at chosen chain positions,
//! so unit and integration tests can drive the pipeline with realistic
//! input instead of hand-written hex.
//!
//! # Example
//!
//! ```rust
//! use registry_cache::test_utils::{hash32, RegistryLogFactory};
//!
//! let factory = RegistryLogFactory::default();
//! let log = factory.new_owner((1, 0, 0), &hash32(0), &hash32(1), &factory.owner(1));
//! assert_eq!(log.block_number, 1);
//! ```

use primitive_types::U256;

use shared_crypto::{address_from_public_key, checksum_encode, subnode_hex};
use shared_types::{bytes_to_hex, RawLog};

use crate::abi::{encode_params, parse_abi_events, AbiValue};
use crate::adapters::artifacts::{registry_abi, registry_contracts, resolver_abi};
use crate::domain::{DeployedContract, KeyList};

/// Registry contract address used by fixtures.
pub const REGISTRY_ADDRESS: &str = "0x00000000000000000000000000000000000000E1";
/// Resolver contract address used by fixtures.
pub const RESOLVER_ADDRESS: &str = "0x00000000000000000000000000000000000000e2";

/// A 32-byte hash whose last byte is `seed`, as `0x` hex.
pub fn hash32(seed: u8) -> String {
    let mut bytes = [0u8; 32];
    bytes[31] = seed;
    bytes_to_hex(&bytes)
}

/// Node of `(parent, label)`; panics on malformed input.
pub fn node_of(parent: &str, label: &str) -> String {
    subnode_hex(parent, label).expect("fixture hashes are valid")
}

/// 64-byte public key `x ++ y` filled from `seed`.
pub fn public_key(seed: u8) -> [u8; 64] {
    let mut key = [0u8; 64];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = seed.wrapping_add(i as u8);
    }
    key
}

/// Address derived from `public_key(seed)`.
pub fn key_address(seed: u8) -> String {
    address_from_public_key(&public_key(seed)).expect("64-byte key")
}

/// `(block, transaction_index, log_index)`.
pub type Position = (u64, u64, u64);

/// Builds registry and resolver logs.
#[derive(Debug, Clone)]
pub struct RegistryLogFactory {
    /// Registry contract address.
    pub registry: String,
    /// Resolver contract address.
    pub resolver: String,
}

impl Default for RegistryLogFactory {
    fn default() -> Self {
        Self {
            registry: REGISTRY_ADDRESS.to_string(),
            resolver: RESOLVER_ADDRESS.to_string(),
        }
    }
}

fn fixed(hex: &str) -> AbiValue {
    let bytes = shared_types::hex_to_bytes(hex).expect("fixture hex is valid");
    AbiValue::FixedBytes(bytes)
}

fn uint(value: u64) -> AbiValue {
    AbiValue::Uint(U256::from(value))
}

impl RegistryLogFactory {
    /// The contracts behind this factory, with built-in ABIs.
    pub fn contracts(&self) -> Vec<DeployedContract> {
        registry_contracts(&self.registry, &self.resolver)
    }

    /// A checksummed owner address derived from `seed`.
    pub fn owner(&self, seed: u8) -> String {
        let mut bytes = [0u8; 20];
        bytes[0] = 0xab;
        bytes[19] = seed;
        checksum_encode(&bytes)
    }

    /// topic0 of a registry or resolver event.
    pub fn topic(&self, name: &str) -> String {
        let mut events = parse_abi_events(&registry_abi()).expect("built-in ABI");
        events.extend(parse_abi_events(&resolver_abi()).expect("built-in ABI"));
        events
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.topic())
            .unwrap_or_else(|| panic!("unknown fixture event {}", name))
    }

    /// A log from `address` with encoded `values`.
    pub fn log(&self, address: &str, name: &str, at: Position, values: &[AbiValue]) -> RawLog {
        let (block_number, transaction_index, log_index) = at;
        RawLog {
            address: address.to_string(),
            data: bytes_to_hex(&encode_params(values)),
            topics: vec![self.topic(name)],
            block_number,
            transaction_index,
            log_index,
            transaction_hash: hash32((block_number % 251) as u8),
        }
    }

    /// `NewOwner(parent, label, owner)`.
    pub fn new_owner(&self, at: Position, parent: &str, label: &str, owner: &str) -> RawLog {
        self.log(
            &self.registry,
            "NewOwner",
            at,
            &[fixed(parent), fixed(label), AbiValue::Address(owner.to_string())],
        )
    }

    /// `Transfer(node, owner)`.
    pub fn transfer(&self, at: Position, node: &str, owner: &str) -> RawLog {
        self.log(
            &self.registry,
            "Transfer",
            at,
            &[fixed(node), AbiValue::Address(owner.to_string())],
        )
    }

    /// `NewResolver(node, resolver)`.
    pub fn new_resolver(&self, at: Position, node: &str, resolver: &str) -> RawLog {
        self.log(
            &self.registry,
            "NewResolver",
            at,
            &[fixed(node), AbiValue::Address(resolver.to_string())],
        )
    }

    /// `NewTTL(node, ttl)`; no handler exists for it.
    pub fn new_ttl(&self, at: Position, node: &str, ttl: u64) -> RawLog {
        self.log(&self.registry, "NewTTL", at, &[fixed(node), uint(ttl)])
    }

    /// `AddrChanged(node, a)`.
    pub fn addr_changed(&self, at: Position, node: &str, address: &str) -> RawLog {
        self.log(
            &self.resolver,
            "AddrChanged",
            at,
            &[fixed(node), AbiValue::Address(address.to_string())],
        )
    }

    /// `ABIChanged(node, contentType, data)`.
    pub fn abi_changed(&self, at: Position, node: &str, content_type: u64, data: &[u8]) -> RawLog {
        self.log(
            &self.resolver,
            "ABIChanged",
            at,
            &[fixed(node), uint(content_type), AbiValue::Bytes(data.to_vec())],
        )
    }

    /// `TextChanged(node, key, value)`.
    pub fn text_changed(&self, at: Position, node: &str, key: &str, value: &str) -> RawLog {
        self.log(
            &self.resolver,
            "TextChanged",
            at,
            &[
                fixed(node),
                AbiValue::String(key.to_string()),
                AbiValue::String(value.to_string()),
            ],
        )
    }

    /// `EthPubKeyAdded` for `public_key(seed)` and its derived address.
    pub fn eth_key_added(&self, at: Position, node: &str, seed: u8, term_date: u64) -> RawLog {
        let key = public_key(seed);
        self.log(
            &self.resolver,
            "EthPubKeyAdded",
            at,
            &[
                fixed(node),
                AbiValue::FixedBytes(key[..32].to_vec()),
                AbiValue::FixedBytes(key[32..].to_vec()),
                AbiValue::Address(key_address(seed)),
                uint(term_date),
            ],
        )
    }

    /// `KomgoMessagingPubKeyAdded` or `VaktMessagingPubKeyAdded`.
    pub fn messaging_key_added(
        &self,
        list: KeyList,
        at: Position,
        node: &str,
        key: &str,
        term_date: u64,
    ) -> RawLog {
        let name = match list {
            KeyList::VaktMessagingPubKeys => "VaktMessagingPubKeyAdded",
            _ => "KomgoMessagingPubKeyAdded",
        };
        self.log(
            &self.resolver,
            name,
            at,
            &[fixed(node), AbiValue::String(key.to_string()), uint(term_date)],
        )
    }

    /// `<List>Revoked(node, index)`.
    pub fn key_revoked(&self, list: KeyList, at: Position, node: &str, index: u64) -> RawLog {
        let name = match list {
            KeyList::EthPubKeys => "EthPubKeyRevoked",
            KeyList::KomgoMessagingPubKeys => "KomgoMessagingPubKeyRevoked",
            KeyList::VaktMessagingPubKeys => "VaktMessagingPubKeyRevoked",
        };
        self.log(&self.resolver, name, at, &[fixed(node), uint(index)])
    }

    /// `ReverseNodeChanged(node, reverseNode)`.
    pub fn reverse_node_changed(&self, at: Position, node: &str, reverse_node: &str) -> RawLog {
        self.log(
            &self.resolver,
            "ReverseNodeChanged",
            at,
            &[fixed(node), fixed(reverse_node)],
        )
    }

    /// A log from a contract outside the allow-list.
    pub fn foreign(&self, at: Position) -> RawLog {
        let mut log = self.transfer(at, &hash32(9), &self.owner(9));
        log.address = "0x00000000000000000000000000000000000000ff".to_string();
        log
    }

    /// A registry log whose data cannot be decoded.
    pub fn undecodable(&self, at: Position) -> RawLog {
        let mut log = self.transfer(at, &hash32(9), &self.owner(9));
        log.data = "0x0102".to_string();
        log
    }
}
