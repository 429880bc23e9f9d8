//! # Member Mutations
//!
//! The write vocabulary of the cache. Appliers produce one mutation per
//! event; the store applies it together with the watermark advance.

use super::member::{AttributeKey, AttributeValue, KeyEntry, KeyList, MemberRecord};

/// A single write against the member collection.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberMutation {
    /// Insert a new member.
    CreateMember(MemberRecord),
    /// Set `owner`.
    UpdateOwner {
        /// Target node.
        node: String,
        /// New owner.
        owner: String,
    },
    /// Set `resolver`.
    UpdateResolver {
        /// Target node.
        node: String,
        /// Resolver address.
        resolver: String,
    },
    /// Set `address`.
    UpdateAddress {
        /// Target node.
        node: String,
        /// Address record.
        address: String,
    },
    /// Set `abi`.
    UpdateAbi {
        /// Target node.
        node: String,
        /// Decoded ABI text.
        abi: String,
    },
    /// Set `reverse_node`.
    UpdateReverseNode {
        /// Target node.
        node: String,
        /// Reverse node.
        reverse_node: String,
    },
    /// Set one whitelisted attribute.
    UpdateField {
        /// Target node.
        node: String,
        /// Attribute.
        key: AttributeKey,
        /// Value.
        value: AttributeValue,
    },
    /// Append a key as the new current entry.
    AddKey {
        /// Target node.
        node: String,
        /// Target list.
        list: KeyList,
        /// New entry.
        entry: KeyEntry,
    },
    /// Revoke the key at `index`.
    RevokeKey {
        /// Target node.
        node: String,
        /// Target list.
        list: KeyList,
        /// Entry index.
        index: usize,
    },
    /// Nothing to write; only the watermark moves.
    Noop,
}

impl MemberMutation {
    /// Node whose record this mutation writes.
    pub fn target_node(&self) -> Option<&str> {
        match self {
            MemberMutation::CreateMember(record) => Some(&record.node),
            MemberMutation::UpdateOwner { node, .. }
            | MemberMutation::UpdateResolver { node, .. }
            | MemberMutation::UpdateAddress { node, .. }
            | MemberMutation::UpdateAbi { node, .. }
            | MemberMutation::UpdateReverseNode { node, .. }
            | MemberMutation::UpdateField { node, .. }
            | MemberMutation::AddKey { node, .. }
            | MemberMutation::RevokeKey { node, .. } => Some(node),
            MemberMutation::Noop => None,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MemberMutation::CreateMember(_) => "create_member",
            MemberMutation::UpdateOwner { .. } => "update_owner",
            MemberMutation::UpdateResolver { .. } => "update_resolver",
            MemberMutation::UpdateAddress { .. } => "update_address",
            MemberMutation::UpdateAbi { .. } => "update_abi",
            MemberMutation::UpdateReverseNode { .. } => "update_reverse_node",
            MemberMutation::UpdateField { .. } => "update_field",
            MemberMutation::AddKey { .. } => "add_key",
            MemberMutation::RevokeKey { .. } => "revoke_key",
            MemberMutation::Noop => "noop",
        }
    }
}

/// Apply `mutation` to the current record of its target node.
///
/// Returns the record to write, or `None` when nothing should be written
/// (no-op, or an update addressed to a missing node).
pub fn apply_mutation(
    current: Option<MemberRecord>,
    mutation: MemberMutation,
) -> Option<MemberRecord> {
    if let MemberMutation::CreateMember(record) = mutation {
        return Some(record);
    }
    let mut record = current?;
    match mutation {
        MemberMutation::UpdateOwner { owner, .. } => record.owner = owner,
        MemberMutation::UpdateResolver { resolver, .. } => record.resolver = Some(resolver),
        MemberMutation::UpdateAddress { address, .. } => record.address = Some(address),
        MemberMutation::UpdateAbi { abi, .. } => record.abi = Some(abi),
        MemberMutation::UpdateReverseNode { reverse_node, .. } => {
            record.reverse_node = Some(reverse_node)
        }
        MemberMutation::UpdateField { key, value, .. } => {
            record.attributes.insert(key, value);
        }
        MemberMutation::AddKey { list, entry, .. } => record.push_current_key(list, entry),
        MemberMutation::RevokeKey { list, index, .. } => {
            if !record.revoke_key(list, index) {
                return None;
            }
        }
        MemberMutation::CreateMember(_) | MemberMutation::Noop => return None,
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> MemberRecord {
        MemberRecord::new("0xnode", "0xparent", "0xlabel", "0xowner")
    }

    #[test]
    fn test_update_missing_node_writes_nothing() {
        let mutation = MemberMutation::UpdateOwner {
            node: "0xnode".into(),
            owner: "0xnew".into(),
        };
        assert_eq!(apply_mutation(None, mutation), None);
    }

    #[test]
    fn test_update_owner() {
        let mutation = MemberMutation::UpdateOwner {
            node: "0xnode".into(),
            owner: "0xnew".into(),
        };
        let updated = apply_mutation(Some(member()), mutation).unwrap();
        assert_eq!(updated.owner, "0xnew");
    }

    #[test]
    fn test_update_field_is_idempotent() {
        let mutation = MemberMutation::UpdateField {
            node: "0xnode".into(),
            key: AttributeKey::StaticId,
            value: AttributeValue::Text("abc".into()),
        };
        let once = apply_mutation(Some(member()), mutation.clone()).unwrap();
        let twice = apply_mutation(Some(once.clone()), mutation).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_add_key_is_not_idempotent() {
        let mutation = MemberMutation::AddKey {
            node: "0xnode".into(),
            list: KeyList::EthPubKeys,
            entry: KeyEntry::new("0xkey", 1, 0),
        };
        let once = apply_mutation(Some(member()), mutation.clone()).unwrap();
        let twice = apply_mutation(Some(once), mutation).unwrap();
        assert_eq!(twice.eth_pub_keys.len(), 2);
        assert!(!twice.eth_pub_keys[0].current);
        assert!(twice.eth_pub_keys[1].current);
    }

    #[test]
    fn test_revoke_out_of_range_writes_nothing() {
        let mutation = MemberMutation::RevokeKey {
            node: "0xnode".into(),
            list: KeyList::VaktMessagingPubKeys,
            index: 3,
        };
        assert_eq!(apply_mutation(Some(member()), mutation), None);
    }

    #[test]
    fn test_noop_target() {
        assert_eq!(MemberMutation::Noop.target_node(), None);
        assert_eq!(apply_mutation(Some(member()), MemberMutation::Noop), None);
    }
}
