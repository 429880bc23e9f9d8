//! # Ethereum Addresses
//!
//! EIP-55 mixed-case checksum encoding and address derivation from an
//! uncompressed secp256k1 public key.

use crate::errors::CryptoError;
use crate::hashing::keccak256;

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Parse a `0x`-prefixed (or bare) hex address into bytes.
pub fn parse_address(value: &str) -> Result<[u8; ADDRESS_LENGTH], CryptoError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    <[u8; ADDRESS_LENGTH]>::try_from(bytes.as_slice()).map_err(|_| CryptoError::InvalidLength {
        expected: ADDRESS_LENGTH,
        actual: bytes.len(),
    })
}

/// Encode address bytes with EIP-55 checksum casing.
pub fn checksum_encode(address: &[u8; ADDRESS_LENGTH]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Re-encode any address string with EIP-55 checksum casing.
pub fn to_checksum_address(value: &str) -> Result<String, CryptoError> {
    Ok(checksum_encode(&parse_address(value)?))
}

/// Derive the address of an uncompressed public key given as `x ++ y`
/// (64 bytes, no `0x04` prefix).
pub fn address_from_public_key(public_key: &[u8]) -> Result<String, CryptoError> {
    if public_key.len() != 64 {
        return Err(CryptoError::InvalidLength {
            expected: 64,
            actual: public_key.len(),
        });
    }
    let hash = keccak256(public_key);
    let mut address = [0u8; ADDRESS_LENGTH];
    address.copy_from_slice(&hash[12..]);
    Ok(checksum_encode(&address))
}

/// Case-insensitive address comparison.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    let a = a.strip_prefix("0x").unwrap_or(a);
    let b = b.strip_prefix("0x").unwrap_or(b);
    a.eq_ignore_ascii_case(b)
}
