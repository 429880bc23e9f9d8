//! # Event Catalog
//!
//! Built once from the deployed contracts: the address allow-list and the
//! topic0 -> event definition map used to decode logs and to subscribe on
//! the bus.

use std::collections::{BTreeSet, HashMap, HashSet};

use shared_types::{routing_key, RawLog};

use crate::domain::{DecodedEvent, DeployedContract};

use super::decoder::decode_log;
use super::errors::AbiError;
use super::registry_events::to_registry_event;
use super::types::{parse_abi_events, EventDefinition};

/// Allow-list and event definitions of the deployed registry contracts.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    contracts: Vec<(String, String)>,
    allowed: HashSet<String>,
    by_topic: HashMap<String, EventDefinition>,
}

impl EventCatalog {
    /// Build the catalog. Every ABI must parse.
    pub fn from_contracts(contracts: &[DeployedContract]) -> Result<Self, AbiError> {
        let mut catalog = Self::default();
        for contract in contracts {
            for definition in parse_abi_events(&contract.abi)? {
                catalog
                    .by_topic
                    .insert(definition.topic().to_lowercase(), definition);
            }
            catalog.allowed.insert(contract.address.to_lowercase());
            catalog
                .contracts
                .push((contract.name.clone(), contract.address.clone()));
        }
        Ok(catalog)
    }

    /// `(name, address)` of every contract.
    pub fn contracts(&self) -> &[(String, String)] {
        &self.contracts
    }

    /// True if logs from `address` should be decoded.
    pub fn is_allowed(&self, address: &str) -> bool {
        self.allowed.contains(&address.to_lowercase())
    }

    /// Event definition for a signature topic.
    pub fn event_for_topic(&self, topic: &str) -> Option<&EventDefinition> {
        self.by_topic.get(&topic.to_lowercase())
    }

    /// Bus routing keys for every known event, sorted.
    pub fn routing_keys(&self) -> Vec<String> {
        self.by_topic
            .keys()
            .map(|topic| routing_key(topic))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Decode a log. Logs from contracts outside the allow-list return
    /// `Ok(None)`; anything undecodable from an allowed contract is an error.
    pub fn decode(&self, log: &RawLog) -> Result<Option<DecodedEvent>, AbiError> {
        if !self.is_allowed(&log.address) {
            return Ok(None);
        }
        let topic = log
            .topic0()
            .map_err(|_| AbiError::UnknownTopic("<none>".to_string()))?;
        let definition = self
            .event_for_topic(topic)
            .ok_or_else(|| AbiError::UnknownTopic(topic.to_string()))?;
        let params = decode_log(definition, log)?;
        let event = to_registry_event(&definition.name, &params)?;
        Ok(Some(DecodedEvent {
            name: definition.name.clone(),
            contract_address: log.address.clone(),
            position: log.position(),
            transaction_hash: log.transaction_hash.clone(),
            event,
        }))
    }
}
