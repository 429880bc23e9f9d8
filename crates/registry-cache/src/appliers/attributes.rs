//! `TextChanged`: whitelisted member attributes.

use tracing::warn;

use crate::domain::{names, AttributeKey, AttributeValue, MemberMutation, MemberRecord, RegistryEvent};

use super::{mismatched, missing_member, ApplyContext};

/// Set one attribute. Values are JSON-parsed when possible, except
/// `nodeKeys` which is stored verbatim. Keys outside the whitelist are
/// ignored.
pub fn text_changed(
    current: Option<&MemberRecord>,
    event: &RegistryEvent,
    _ctx: &ApplyContext,
) -> MemberMutation {
    let RegistryEvent::TextChanged { node, key, value } = event else {
        return mismatched(names::TEXT_CHANGED, event);
    };
    let Some(attribute) = AttributeKey::parse(key) else {
        warn!(node = %node, key = %key, "Ignoring non-whitelisted text key");
        return MemberMutation::Noop;
    };
    if current.is_none() {
        return missing_member(names::TEXT_CHANGED, node);
    }
    let value = if attribute.is_raw() {
        AttributeValue::Text(value.clone())
    } else {
        AttributeValue::parse_text(value)
    };
    MemberMutation::UpdateField {
        node: node.clone(),
        key: attribute,
        value,
    }
}
