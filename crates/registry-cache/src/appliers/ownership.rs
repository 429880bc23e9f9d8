//! Registry and resolver identity events.

use tracing::warn;

use shared_crypto::subnode_hex;

use crate::domain::{names, MemberMutation, MemberRecord, RegistryEvent};

use super::{mismatched, missing_member, ApplyContext};

/// `NewOwner`: create the subnode on first sight, otherwise re-own it.
pub fn new_owner(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    _ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::NewOwner { node, label, owner } = event else {
        return mismatched(names::NEW_OWNER, event);
    };
    if let Some(existing) = current {
        return MemberMutation::UpdateOwner {
            node: existing.node.clone(),
            owner: owner.clone(),
        };
    }
    match subnode_hex(node, label) {
        Ok(subnode) => MemberMutation::CreateMember(MemberRecord::new(
            subnode,
            node.clone(),
            label.clone(),
            owner.clone(),
        )),
        Err(e) => {
            warn!(parent_node = %node, label = %label, error = %e, "Cannot derive subnode");
            MemberMutation::Noop
        }
    }
}

/// `Transfer`: new owner of an existing node.
pub fn transfer(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    _ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::Transfer { node, owner } = event else {
        return mismatched(names::TRANSFER, event);
    };
    match current {
        Some(_) => MemberMutation::UpdateOwner {
            node: node.clone(),
            owner: owner.clone(),
        },
        None => missing_member(names::TRANSFER, node),
    }
}

/// `NewResolver`.
pub fn new_resolver(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    _ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::NewResolver { node, resolver } = event else {
        return mismatched(names::NEW_RESOLVER, event);
    };
    match current {
        Some(_) => MemberMutation::UpdateResolver {
            node: node.clone(),
            resolver: resolver.clone(),
        },
        None => missing_member(names::NEW_RESOLVER, node),
    }
}

/// `AddrChanged`.
pub fn addr_changed(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    _ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::AddrChanged { node, address } = event else {
        return mismatched(names::ADDR_CHANGED, event);
    };
    match current {
        Some(_) => MemberMutation::UpdateAddress {
            node: node.clone(),
            address: address.clone(),
        },
        None => missing_member(names::ADDR_CHANGED, node),
    }
}

/// `ABIChanged`: the ABI bytes are stored as text, invalid sequences
/// replaced.
pub fn abi_changed(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    _ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::AbiChanged { node, data, .. } = event else {
        return mismatched(names::ABI_CHANGED, event);
    };
    match current {
        Some(_) => MemberMutation::UpdateAbi {
            node: node.clone(),
            abi: String::from_utf8_lossy(data).into_owned(),
        },
        None => missing_member(names::ABI_CHANGED, node),
    }
}

/// `ReverseNodeChanged`.
pub fn reverse_node_changed(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    _ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::ReverseNodeChanged { node, reverse_node } = event else {
        return mismatched(names::REVERSE_NODE_CHANGED, event);
    };
    match current {
        Some(_) => MemberMutation::UpdateReverseNode {
            node: node.clone(),
            reverse_node: reverse_node.clone(),
        },
        None => missing_member(names::REVERSE_NODE_CHANGED, node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT: &str = "0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae";
    const LABEL: &str = "0x4f5b812789fc606be1b3b16908db13fc7a9adf7ca72641f84d75b47069d3d7f0";
    const CTX: ApplyContext = ApplyContext { applied_at: 0 };

    fn new_owner_event(owner: &str) -> RegistryEvent {
        RegistryEvent::NewOwner {
            node: PARENT.into(),
            label: LABEL.into(),
            owner: owner.into(),
        }
    }

    #[test]
    fn test_new_owner_creates_subnode() {
        match new_owner(None, &new_owner_event("0xA"), &CTX) {
            MemberMutation::CreateMember(record) => {
                assert_eq!(record.node, subnode_hex(PARENT, LABEL).unwrap());
                assert_eq!(record.parent_node, PARENT);
                assert_eq!(record.label, LABEL);
                assert_eq!(record.owner, "0xA");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_new_owner_on_existing_updates_owner() {
        let existing = MemberRecord::new("0xnode", PARENT, LABEL, "0xA");
        assert_eq!(
            new_owner(Some(&existing), &new_owner_event("0xB"), &CTX),
            MemberMutation::UpdateOwner {
                node: "0xnode".into(),
                owner: "0xB".into()
            }
        );
    }

    #[test]
    fn test_new_owner_bad_hash_is_noop() {
        let event = RegistryEvent::NewOwner {
            node: "0x12".into(),
            label: LABEL.into(),
            owner: "0xA".into(),
        };
        assert_eq!(new_owner(None, &event, &CTX), MemberMutation::Noop);
    }

    #[test]
    fn test_transfer_missing_member_is_noop() {
        let event = RegistryEvent::Transfer {
            node: "0xnode".into(),
            owner: "0xB".into(),
        };
        assert_eq!(transfer(None, &event, &CTX), MemberMutation::Noop);
    }

    #[test]
    fn test_abi_changed_lossy_text() {
        let existing = MemberRecord::new("0xnode", PARENT, LABEL, "0xA");
        let event = RegistryEvent::AbiChanged {
            node: "0xnode".into(),
            content_type: 1,
            data: b"[{\"type\":\"event\"}]\xff".to_vec(),
        };
        match abi_changed(Some(&existing), &event, &CTX) {
            MemberMutation::UpdateAbi { abi, .. } => {
                assert!(abi.starts_with("[{\"type\":\"event\"}]"));
                assert!(abi.ends_with('\u{FFFD}'));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_handler_rejects_foreign_event() {
        let event = RegistryEvent::Transfer {
            node: "0xnode".into(),
            owner: "0xB".into(),
        };
        assert_eq!(new_resolver(None, &event, &CTX), MemberMutation::Noop);
    }
}
