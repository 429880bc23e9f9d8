//! Decoded ABI values.

use primitive_types::U256;

use shared_types::bytes_to_hex;

use super::types::ParamType;

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    /// EIP-55 checksummed address.
    Address(String),
    /// Boolean.
    Bool(bool),
    /// Unsigned integer.
    Uint(U256),
    /// Signed integer, two's complement in 256 bits.
    Int(U256),
    /// `bytesN` content (N bytes).
    FixedBytes(Vec<u8>),
    /// `bytes` content.
    Bytes(Vec<u8>),
    /// `string` content.
    String(String),
}

impl AbiValue {
    /// Type this value was decoded as.
    pub fn param_type(&self) -> ParamType {
        match self {
            AbiValue::Address(_) => ParamType::Address,
            AbiValue::Bool(_) => ParamType::Bool,
            AbiValue::Uint(_) => ParamType::Uint(256),
            AbiValue::Int(_) => ParamType::Int(256),
            AbiValue::FixedBytes(bytes) => ParamType::FixedBytes(bytes.len()),
            AbiValue::Bytes(_) => ParamType::Bytes,
            AbiValue::String(_) => ParamType::String,
        }
    }

    /// `bytesN` value as `0x` hex.
    pub fn as_fixed_hex(&self) -> Option<String> {
        match self {
            AbiValue::FixedBytes(bytes) => Some(bytes_to_hex(bytes)),
            _ => None,
        }
    }

    /// Address value.
    pub fn as_address(&self) -> Option<&str> {
        match self {
            AbiValue::Address(address) => Some(address),
            _ => None,
        }
    }

    /// Unsigned integer value.
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(value) => Some(*value),
            _ => None,
        }
    }

    /// String value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Raw bytes of a `bytes` or `bytesN` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AbiValue::Bytes(bytes) | AbiValue::FixedBytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}
