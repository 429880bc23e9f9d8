//! # Registry Events
//!
//! Typed form of the registry and resolver contract events. Produced by the
//! ABI layer, consumed by the appliers.

use serde::Serialize;
use shared_types::EventPosition;

use super::member::KeyList;

/// Event names handled by the cache.
pub mod names {
    /// Subnode created or re-owned.
    pub const NEW_OWNER: &str = "NewOwner";
    /// Node ownership transferred.
    pub const TRANSFER: &str = "Transfer";
    /// Resolver set.
    pub const NEW_RESOLVER: &str = "NewResolver";
    /// Address record set.
    pub const ADDR_CHANGED: &str = "AddrChanged";
    /// ABI record set.
    pub const ABI_CHANGED: &str = "ABIChanged";
    /// Text record set.
    pub const TEXT_CHANGED: &str = "TextChanged";
    /// Eth key appended.
    pub const ETH_PUB_KEY_ADDED: &str = "EthPubKeyAdded";
    /// Eth key revoked.
    pub const ETH_PUB_KEY_REVOKED: &str = "EthPubKeyRevoked";
    /// Platform messaging key appended.
    pub const KOMGO_MESSAGING_PUB_KEY_ADDED: &str = "KomgoMessagingPubKeyAdded";
    /// Platform messaging key revoked.
    pub const KOMGO_MESSAGING_PUB_KEY_REVOKED: &str = "KomgoMessagingPubKeyRevoked";
    /// Partner messaging key appended.
    pub const VAKT_MESSAGING_PUB_KEY_ADDED: &str = "VaktMessagingPubKeyAdded";
    /// Partner messaging key revoked.
    pub const VAKT_MESSAGING_PUB_KEY_REVOKED: &str = "VaktMessagingPubKeyRevoked";
    /// Reverse node set.
    pub const REVERSE_NODE_CHANGED: &str = "ReverseNodeChanged";
}

/// A decoded registry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistryEvent {
    /// `NewOwner(node, label, owner)`; `node` is the parent.
    NewOwner {
        /// Parent node.
        node: String,
        /// Label hash.
        label: String,
        /// New owner.
        owner: String,
    },
    /// `Transfer(node, owner)`.
    Transfer {
        /// Node.
        node: String,
        /// New owner.
        owner: String,
    },
    /// `NewResolver(node, resolver)`.
    NewResolver {
        /// Node.
        node: String,
        /// Resolver address.
        resolver: String,
    },
    /// `AddrChanged(node, a)`.
    AddrChanged {
        /// Node.
        node: String,
        /// Address.
        address: String,
    },
    /// `ABIChanged(node, contentType, data)`.
    AbiChanged {
        /// Node.
        node: String,
        /// ABI content type bitmask.
        content_type: u64,
        /// Raw ABI bytes.
        data: Vec<u8>,
    },
    /// `TextChanged(node, key, value)`.
    TextChanged {
        /// Node.
        node: String,
        /// Attribute name.
        key: String,
        /// Raw attribute value.
        value: String,
    },
    /// Any of the `*PubKeyAdded` events.
    KeyAdded {
        /// Target list.
        list: KeyList,
        /// Node.
        node: String,
        /// Key material.
        key: String,
        /// Address carried by eth key events.
        address: Option<String>,
        /// Termination date.
        term_date: u64,
    },
    /// Any of the `*PubKeyRevoked` events.
    KeyRevoked {
        /// Target list.
        list: KeyList,
        /// Node.
        node: String,
        /// Entry index.
        index: u64,
    },
    /// `ReverseNodeChanged(node, reverseNode)`.
    ReverseNodeChanged {
        /// Node.
        node: String,
        /// Reverse node.
        reverse_node: String,
    },
    /// Decoded from a known ABI, but not an event the cache tracks.
    Unrecognized {
        /// Event name from the ABI.
        name: String,
    },
}

/// How the applier finds the record an event touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberLookup<'a> {
    /// By primary key.
    ByNode(&'a str),
    /// By parent node and label (`NewOwner`).
    ByParentAndLabel {
        /// Parent node.
        parent_node: &'a str,
        /// Label hash.
        label: &'a str,
    },
    /// The event touches no record.
    None,
}

impl RegistryEvent {
    /// Record lookup for this event.
    pub fn lookup(&self) -> MemberLookup<'_> {
        match self {
            RegistryEvent::NewOwner { node, label, .. } => MemberLookup::ByParentAndLabel {
                parent_node: node,
                label,
            },
            RegistryEvent::Transfer { node, .. }
            | RegistryEvent::NewResolver { node, .. }
            | RegistryEvent::AddrChanged { node, .. }
            | RegistryEvent::AbiChanged { node, .. }
            | RegistryEvent::TextChanged { node, .. }
            | RegistryEvent::KeyAdded { node, .. }
            | RegistryEvent::KeyRevoked { node, .. }
            | RegistryEvent::ReverseNodeChanged { node, .. } => MemberLookup::ByNode(node),
            RegistryEvent::Unrecognized { .. } => MemberLookup::None,
        }
    }
}

/// A decoded event together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    /// Event name from the ABI.
    pub name: String,
    /// Emitting contract.
    pub contract_address: String,
    /// Chain position.
    pub position: EventPosition,
    /// Emitting transaction.
    pub transaction_hash: String,
    /// Typed payload.
    pub event: RegistryEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_new_owner_uses_parent_and_label() {
        let event = RegistryEvent::NewOwner {
            node: "0xparent".into(),
            label: "0xlabel".into(),
            owner: "0xowner".into(),
        };
        assert_eq!(
            event.lookup(),
            MemberLookup::ByParentAndLabel {
                parent_node: "0xparent",
                label: "0xlabel"
            }
        );
    }

    #[test]
    fn test_lookup_by_node() {
        let event = RegistryEvent::KeyRevoked {
            list: KeyList::EthPubKeys,
            node: "0xnode".into(),
            index: 0,
        };
        assert_eq!(event.lookup(), MemberLookup::ByNode("0xnode"));
        let unknown = RegistryEvent::Unrecognized {
            name: "NewTTL".into(),
        };
        assert_eq!(unknown.lookup(), MemberLookup::None);
    }
}
