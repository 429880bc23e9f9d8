//! # Hex Encoding Helpers
//!
//! Ethereum JSON-RPC encodes byte strings as `0x`-prefixed hex and numbers as
//! hex "quantities" without leading zeros (`0x0`, `0x1a`).

use crate::errors::TypesError;

/// Decode a hex string, with or without the `0x` prefix.
pub fn hex_to_bytes(value: &str) -> Result<Vec<u8>, TypesError> {
    let stripped = strip_prefix(value);
    hex::decode(stripped).map_err(|e| TypesError::InvalidHex {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Encode a number as a JSON-RPC quantity.
pub fn to_quantity(value: u64) -> String {
    format!("{:#x}", value)
}

/// Parse a JSON-RPC quantity (`0x1a`) or a decimal string.
pub fn parse_quantity(value: &str) -> Result<u64, TypesError> {
    let trimmed = value.trim();
    let parsed = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        let digits = strip_prefix(trimmed);
        if digits.is_empty() {
            return Err(TypesError::InvalidQuantity(value.to_string()));
        }
        u64::from_str_radix(digits, 16)
    } else {
        trimmed.parse::<u64>()
    };
    parsed.map_err(|_| TypesError::InvalidQuantity(value.to_string()))
}

fn strip_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Serde adapter for numeric fields that may arrive as JSON numbers or as hex
/// quantities. Always serializes as a plain number.
pub mod quantity {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    /// Serialize as a JSON number.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    /// Deserialize from a JSON number, hex quantity or decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_any(QuantityVisitor)
    }

    struct QuantityVisitor;

    impl<'de> Visitor<'de> for QuantityVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative integer or a hex quantity string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("negative quantity {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            super::parse_quantity(v).map_err(E::custom)
        }
    }
}
