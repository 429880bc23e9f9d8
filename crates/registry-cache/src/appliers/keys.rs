//! Key rotation: `*PubKeyAdded` and `*PubKeyRevoked`.

use tracing::warn;

use shared_crypto::{address_from_public_key, addresses_equal};
use shared_types::hex_to_bytes;

use crate::domain::{KeyEntry, KeyList, MemberMutation, MemberRecord, RegistryEvent};

use super::{mismatched, missing_member, ApplyContext};

/// Append a key as the new current entry of its list.
pub fn key_added(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::KeyAdded {
        list,
        node,
        key,
        address,
        term_date,
    } = event
    else {
        return mismatched("KeyAdded", event);
    };
    if current.is_none() {
        return missing_member(list.as_str(), node);
    }

    let mut entry = KeyEntry::new(key.clone(), ctx.applied_at, *term_date);
    if let Some(address) = address {
        if *list == KeyList::EthPubKeys {
            check_derived_address(node, key, address);
        }
        entry = entry.with_address(address.clone());
    }
    MemberMutation::AddKey {
        node: node.clone(),
        list: *list,
        entry,
    }
}

/// Revoke the entry at the event's index. Out-of-range indexes are ignored.
pub fn key_revoked(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    _ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::KeyRevoked { list, node, index } = event else {
        return mismatched("KeyRevoked", event);
    };
    let Some(record) = current else {
        return missing_member(list.as_str(), node);
    };
    let len = record.keys(*list).len();
    match usize::try_from(*index) {
        Ok(index) if index < len => MemberMutation::RevokeKey {
            node: node.clone(),
            list: *list,
            index,
        },
        _ => {
            warn!(node = %node, list = list.as_str(), index, len, "Revoke index out of range");
            MemberMutation::Noop
        }
    }
}

/// The published address should be the one derived from the key.
fn check_derived_address(node: &str, key: &str, address: &str) {
    let derived = hex_to_bytes(key)
        .map_err(|e| e.to_string())
        .and_then(|bytes| address_from_public_key(&bytes).map_err(|e| e.to_string()));
    match derived {
        Ok(derived) if addresses_equal(&derived, address) => {}
        Ok(derived) => warn!(
            node = %node,
            address = %address,
            derived = %derived,
            "Eth key does not derive to the published address"
        ),
        Err(e) => warn!(node = %node, error = %e, "Eth key is not a 64-byte public key"),
    }
}
