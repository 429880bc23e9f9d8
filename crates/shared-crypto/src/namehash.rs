//! # ENS Node Hashing
//!
//! A registry node is `keccak256(parent_node ++ label_hash)`; the root node
//! is 32 zero bytes. `namehash("a.b")` folds labels right to left.

use crate::errors::CryptoError;
use crate::hashing::{keccak256, Hash, Keccak256Hasher};

/// The root node (32 zero bytes).
pub const ROOT_NODE: Hash = [0u8; 32];

/// Hash of a single label.
pub fn label_hash(label: &str) -> Hash {
    keccak256(label.as_bytes())
}

/// Node of `label` under `parent`.
pub fn subnode(parent: &Hash, label: &Hash) -> Hash {
    let mut hasher = Keccak256Hasher::new();
    hasher.update(parent).update(label);
    hasher.finalize()
}

/// ENS namehash of a dotted name.
pub fn namehash(name: &str) -> Hash {
    if name.is_empty() {
        return ROOT_NODE;
    }
    name.rsplit('.')
        .fold(ROOT_NODE, |node, label| subnode(&node, &label_hash(label)))
}

/// Parse a `0x`-prefixed 32-byte hex value.
pub fn parse_hash(value: &str) -> Result<Hash, CryptoError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    <Hash>::try_from(bytes.as_slice()).map_err(|_| CryptoError::InvalidLength {
        expected: 32,
        actual: bytes.len(),
    })
}

/// Hex form of `subnode` over hex inputs.
pub fn subnode_hex(parent: &str, label: &str) -> Result<String, CryptoError> {
    let node = subnode(&parse_hash(parent)?, &parse_hash(label)?);
    Ok(format!("0x{}", hex::encode(node)))
}
