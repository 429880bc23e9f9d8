//! # ABI Types
//!
//! Parameter types, event definitions and JSON ABI parsing.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use shared_crypto::event_topic;

use super::errors::AbiError;

/// Solidity parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// `address`
    Address,
    /// `bool`
    Bool,
    /// `uintN`
    Uint(usize),
    /// `intN`
    Int(usize),
    /// `bytesN`, 1..=32
    FixedBytes(usize),
    /// `bytes`
    Bytes,
    /// `string`
    String,
}

impl ParamType {
    /// Parse a canonical type string.
    pub fn parse(kind: &str) -> Result<Self, AbiError> {
        let unsupported = || AbiError::UnsupportedType(kind.to_string());
        match kind {
            "address" => return Ok(ParamType::Address),
            "bool" => return Ok(ParamType::Bool),
            "bytes" => return Ok(ParamType::Bytes),
            "string" => return Ok(ParamType::String),
            "uint" => return Ok(ParamType::Uint(256)),
            "int" => return Ok(ParamType::Int(256)),
            _ => {}
        }
        let sized = |digits: &str| -> Result<usize, AbiError> {
            digits.parse::<usize>().map_err(|_| unsupported())
        };
        if let Some(bits) = kind.strip_prefix("uint") {
            let bits = sized(bits)?;
            if bits == 0 || bits > 256 || bits % 8 != 0 {
                return Err(unsupported());
            }
            return Ok(ParamType::Uint(bits));
        }
        if let Some(bits) = kind.strip_prefix("int") {
            let bits = sized(bits)?;
            if bits == 0 || bits > 256 || bits % 8 != 0 {
                return Err(unsupported());
            }
            return Ok(ParamType::Int(bits));
        }
        if let Some(len) = kind.strip_prefix("bytes") {
            let len = sized(len)?;
            if len == 0 || len > 32 {
                return Err(unsupported());
            }
            return Ok(ParamType::FixedBytes(len));
        }
        Err(unsupported())
    }

    /// Dynamic types are encoded out of line.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ParamType::Bytes | ParamType::String)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Address => f.write_str("address"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Uint(bits) => write!(f, "uint{}", bits),
            ParamType::Int(bits) => write!(f, "int{}", bits),
            ParamType::FixedBytes(len) => write!(f, "bytes{}", len),
            ParamType::Bytes => f.write_str("bytes"),
            ParamType::String => f.write_str("string"),
        }
    }
}

/// One event input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParam {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    pub kind: ParamType,
    /// Carried in a topic rather than in data.
    pub indexed: bool,
}

/// An event from a contract ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDefinition {
    /// Event name.
    pub name: String,
    /// Inputs in declaration order.
    pub inputs: Vec<EventParam>,
    /// Anonymous events have no signature topic.
    pub anonymous: bool,
}

impl EventDefinition {
    /// Build a definition from `(name, type, indexed)` triples.
    pub fn new(name: &str, inputs: &[(&str, ParamType, bool)]) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs
                .iter()
                .map(|(param, kind, indexed)| EventParam {
                    name: param.to_string(),
                    kind: *kind,
                    indexed: *indexed,
                })
                .collect(),
            anonymous: false,
        }
    }

    /// Canonical signature, e.g. `Transfer(bytes32,address)`.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(|p| p.kind.to_string()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// `0x`-prefixed keccak256 of the signature.
    pub fn topic(&self) -> String {
        event_topic(&self.signature())
    }
}

#[derive(Deserialize)]
struct AbiItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<AbiInput>,
    #[serde(default)]
    anonymous: bool,
}

#[derive(Deserialize)]
struct AbiInput {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    indexed: bool,
}

/// Extract the non-anonymous event definitions from a JSON ABI array.
pub fn parse_abi_events(abi: &Value) -> Result<Vec<EventDefinition>, AbiError> {
    let items: Vec<AbiItem> = serde_json::from_value(abi.clone())
        .map_err(|e| AbiError::MalformedAbi(e.to_string()))?;

    items
        .into_iter()
        .filter(|item| item.kind == "event" && !item.anonymous)
        .map(|item| {
            let inputs = item
                .inputs
                .into_iter()
                .map(|input| {
                    Ok(EventParam {
                        name: input.name,
                        kind: ParamType::parse(&input.kind)?,
                        indexed: input.indexed,
                    })
                })
                .collect::<Result<Vec<_>, AbiError>>()?;
            Ok(EventDefinition {
                name: item.name,
                inputs,
                anonymous: false,
            })
        })
        .collect()
}
