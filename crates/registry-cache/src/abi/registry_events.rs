//! Mapping from decoded parameters to typed registry events.
//!
//! Parameters are taken by position, so the mapping holds for any parameter
//! naming the contracts use.

use primitive_types::U256;

use crate::domain::{names, KeyList, RegistryEvent};

use super::errors::AbiError;
use super::value::AbiValue;

struct Params<'a> {
    event: &'a str,
    values: &'a [(String, AbiValue)],
}

impl<'a> Params<'a> {
    fn expect_len(&self, len: usize) -> Result<(), AbiError> {
        if self.values.len() != len {
            return Err(self.shape(format!(
                "expected {} parameters, got {}",
                len,
                self.values.len()
            )));
        }
        Ok(())
    }

    fn shape(&self, reason: String) -> AbiError {
        AbiError::Shape {
            event: self.event.to_string(),
            reason,
        }
    }

    fn get(&self, index: usize) -> Result<&'a AbiValue, AbiError> {
        self.values
            .get(index)
            .map(|(_, value)| value)
            .ok_or_else(|| self.shape(format!("missing parameter {}", index)))
    }

    fn hash(&self, index: usize) -> Result<String, AbiError> {
        match self.get(index)? {
            AbiValue::FixedBytes(bytes) if bytes.len() == 32 => Ok(shared_types::bytes_to_hex(bytes)),
            other => Err(self.shape(format!("parameter {} is {}, not bytes32", index, other.param_type()))),
        }
    }

    fn raw_hash(&self, index: usize) -> Result<&'a [u8], AbiError> {
        match self.get(index)? {
            AbiValue::FixedBytes(bytes) if bytes.len() == 32 => Ok(bytes),
            other => Err(self.shape(format!("parameter {} is {}, not bytes32", index, other.param_type()))),
        }
    }

    fn address(&self, index: usize) -> Result<String, AbiError> {
        self.get(index)?
            .as_address()
            .map(str::to_string)
            .ok_or_else(|| self.shape(format!("parameter {} is not an address", index)))
    }

    fn string(&self, index: usize) -> Result<String, AbiError> {
        self.get(index)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.shape(format!("parameter {} is not a string", index)))
    }

    fn bytes(&self, index: usize) -> Result<Vec<u8>, AbiError> {
        match self.get(index)? {
            AbiValue::Bytes(bytes) => Ok(bytes.clone()),
            _ => Err(self.shape(format!("parameter {} is not bytes", index))),
        }
    }

    fn uint(&self, index: usize) -> Result<u64, AbiError> {
        let value: U256 = self
            .get(index)?
            .as_uint()
            .ok_or_else(|| self.shape(format!("parameter {} is not an unsigned integer", index)))?;
        if value.bits() > 64 {
            return Err(self.shape(format!("parameter {} value {} exceeds 64 bits", index, value)));
        }
        Ok(value.low_u64())
    }
}

fn key_list(name: &str) -> Option<(KeyList, bool)> {
    match name {
        names::ETH_PUB_KEY_ADDED => Some((KeyList::EthPubKeys, true)),
        names::ETH_PUB_KEY_REVOKED => Some((KeyList::EthPubKeys, false)),
        names::KOMGO_MESSAGING_PUB_KEY_ADDED => Some((KeyList::KomgoMessagingPubKeys, true)),
        names::KOMGO_MESSAGING_PUB_KEY_REVOKED => Some((KeyList::KomgoMessagingPubKeys, false)),
        names::VAKT_MESSAGING_PUB_KEY_ADDED => Some((KeyList::VaktMessagingPubKeys, true)),
        names::VAKT_MESSAGING_PUB_KEY_REVOKED => Some((KeyList::VaktMessagingPubKeys, false)),
        _ => None,
    }
}

/// Build the typed event for `name` from its decoded parameters.
pub fn to_registry_event(
    name: &str,
    values: &[(String, AbiValue)],
) -> Result<RegistryEvent, AbiError> {
    let p = Params {
        event: name,
        values,
    };

    if let Some((list, added)) = key_list(name) {
        return if !added {
            p.expect_len(2)?;
            Ok(RegistryEvent::KeyRevoked {
                list,
                node: p.hash(0)?,
                index: p.uint(1)?,
            })
        } else if list == KeyList::EthPubKeys {
            p.expect_len(5)?;
            let mut key = p.raw_hash(1)?.to_vec();
            key.extend_from_slice(p.raw_hash(2)?);
            Ok(RegistryEvent::KeyAdded {
                list,
                node: p.hash(0)?,
                key: shared_types::bytes_to_hex(&key),
                address: Some(p.address(3)?),
                term_date: p.uint(4)?,
            })
        } else {
            p.expect_len(3)?;
            Ok(RegistryEvent::KeyAdded {
                list,
                node: p.hash(0)?,
                key: p.string(1)?,
                address: None,
                term_date: p.uint(2)?,
            })
        };
    }

    let event = match name {
        names::NEW_OWNER => {
            p.expect_len(3)?;
            RegistryEvent::NewOwner {
                node: p.hash(0)?,
                label: p.hash(1)?,
                owner: p.address(2)?,
            }
        }
        names::TRANSFER => {
            p.expect_len(2)?;
            RegistryEvent::Transfer {
                node: p.hash(0)?,
                owner: p.address(1)?,
            }
        }
        names::NEW_RESOLVER => {
            p.expect_len(2)?;
            RegistryEvent::NewResolver {
                node: p.hash(0)?,
                resolver: p.address(1)?,
            }
        }
        names::ADDR_CHANGED => {
            p.expect_len(2)?;
            RegistryEvent::AddrChanged {
                node: p.hash(0)?,
                address: p.address(1)?,
            }
        }
        names::ABI_CHANGED => {
            p.expect_len(3)?;
            RegistryEvent::AbiChanged {
                node: p.hash(0)?,
                content_type: p.uint(1)?,
                data: p.bytes(2)?,
            }
        }
        names::TEXT_CHANGED => {
            p.expect_len(3)?;
            RegistryEvent::TextChanged {
                node: p.hash(0)?,
                key: p.string(1)?,
                value: p.string(2)?,
            }
        }
        names::REVERSE_NODE_CHANGED => {
            p.expect_len(2)?;
            RegistryEvent::ReverseNodeChanged {
                node: p.hash(0)?,
                reverse_node: p.hash(1)?,
            }
        }
        other => RegistryEvent::Unrecognized {
            name: other.to_string(),
        },
    };
    Ok(event)
}
