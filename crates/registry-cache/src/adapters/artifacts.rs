//! # Contract Artifacts
//!
//! Where the deployed registry contracts and their ABIs come from: a JSON
//! file written at deployment time, or a fixed list. The registry and
//! resolver event ABIs are built in, so an artifact entry may omit `abi`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

use crate::domain::{DeployedContract, RegistryCacheError};
use crate::ports::ContractArtifacts;

/// Name of the registry contract.
pub const REGISTRY_CONTRACT: &str = "ENSRegistry";
/// Name of the resolver contract.
pub const RESOLVER_CONTRACT: &str = "KomgoResolver";

fn event(name: &str, inputs: &[(&str, &str)]) -> Value {
    let inputs: Vec<Value> = inputs
        .iter()
        .map(|(param, kind)| json!({"name": param, "type": kind, "indexed": false}))
        .collect();
    json!({"type": "event", "name": name, "anonymous": false, "inputs": inputs})
}

/// Event ABI of the registry contract.
pub fn registry_abi() -> Value {
    Value::Array(vec![
        event("NewOwner", &[("node", "bytes32"), ("label", "bytes32"), ("owner", "address")]),
        event("Transfer", &[("node", "bytes32"), ("owner", "address")]),
        event("NewResolver", &[("node", "bytes32"), ("resolver", "address")]),
        event("NewTTL", &[("node", "bytes32"), ("ttl", "uint64")]),
    ])
}

/// Event ABI of the resolver contract.
pub fn resolver_abi() -> Value {
    Value::Array(vec![
        event("AddrChanged", &[("node", "bytes32"), ("a", "address")]),
        event(
            "ABIChanged",
            &[("node", "bytes32"), ("contentType", "uint256"), ("data", "bytes")],
        ),
        event("TextChanged", &[("node", "bytes32"), ("key", "string"), ("value", "string")]),
        event(
            "EthPubKeyAdded",
            &[
                ("node", "bytes32"),
                ("publicKey", "bytes32"),
                ("publicKeyTail", "bytes32"),
                ("addr", "address"),
                ("termDate", "uint256"),
            ],
        ),
        event("EthPubKeyRevoked", &[("node", "bytes32"), ("index", "uint256")]),
        event(
            "KomgoMessagingPubKeyAdded",
            &[("node", "bytes32"), ("key", "string"), ("termDate", "uint256")],
        ),
        event(
            "KomgoMessagingPubKeyRevoked",
            &[("node", "bytes32"), ("index", "uint256")],
        ),
        event(
            "VaktMessagingPubKeyAdded",
            &[("node", "bytes32"), ("key", "string"), ("termDate", "uint256")],
        ),
        event(
            "VaktMessagingPubKeyRevoked",
            &[("node", "bytes32"), ("index", "uint256")],
        ),
        event(
            "ReverseNodeChanged",
            &[("node", "bytes32"), ("reverseNode", "bytes32")],
        ),
    ])
}

/// Built-in ABI for a known contract name.
pub fn builtin_abi(name: &str) -> Option<Value> {
    match name {
        REGISTRY_CONTRACT => Some(registry_abi()),
        RESOLVER_CONTRACT => Some(resolver_abi()),
        _ => None,
    }
}

/// The registry and resolver at the given addresses, with built-in ABIs.
pub fn registry_contracts(registry_address: &str, resolver_address: &str) -> Vec<DeployedContract> {
    vec![
        DeployedContract {
            name: REGISTRY_CONTRACT.to_string(),
            address: registry_address.to_string(),
            abi: registry_abi(),
        },
        DeployedContract {
            name: RESOLVER_CONTRACT.to_string(),
            address: resolver_address.to_string(),
            abi: resolver_abi(),
        },
    ]
}

#[derive(Deserialize)]
struct ArtifactEntry {
    name: String,
    address: String,
    #[serde(default)]
    abi: Option<Value>,
}

/// Parse an artifact document `[{name, address, abi?}]`.
pub fn parse_artifacts(raw: &str) -> Result<Vec<DeployedContract>, RegistryCacheError> {
    let entries: Vec<ArtifactEntry> = serde_json::from_str(raw)
        .map_err(|e| RegistryCacheError::Configuration(format!("contract artifacts: {}", e)))?;
    entries
        .into_iter()
        .map(|entry| {
            let abi = match entry.abi {
                Some(abi) => abi,
                None => builtin_abi(&entry.name).ok_or_else(|| {
                    RegistryCacheError::Configuration(format!(
                        "contract {} has no ABI and no built-in one",
                        entry.name
                    ))
                })?,
            };
            Ok(DeployedContract {
                name: entry.name,
                address: entry.address,
                abi,
            })
        })
        .collect()
}

/// Artifacts read from a JSON file on every call.
pub struct FileContractArtifacts {
    path: PathBuf,
}

impl FileContractArtifacts {
    /// Artifacts at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContractArtifacts for FileContractArtifacts {
    async fn deployed_contracts(&self) -> Result<Vec<DeployedContract>, RegistryCacheError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RegistryCacheError::Configuration(format!("{}: {}", self.path.display(), e))
        })?;
        let contracts = parse_artifacts(&raw)?;
        info!(
            path = %self.path.display(),
            contracts = contracts.len(),
            "Loaded contract artifacts"
        );
        Ok(contracts)
    }
}

/// Artifacts fixed at construction.
pub struct StaticContractArtifacts {
    contracts: Vec<DeployedContract>,
}

impl StaticContractArtifacts {
    /// Artifacts returning `contracts`.
    pub fn new(contracts: Vec<DeployedContract>) -> Self {
        Self { contracts }
    }
}

#[async_trait]
impl ContractArtifacts for StaticContractArtifacts {
    async fn deployed_contracts(&self) -> Result<Vec<DeployedContract>, RegistryCacheError> {
        Ok(self.contracts.clone())
    }
}
