//! # Event Appliers
//!
//! One pure handler per event name, looked up in a dispatch table. Handlers
//! never touch the store: they map the current record (if any) and the
//! event to a single `MemberMutation`.

mod attributes;
mod keys;
mod ownership;

use std::collections::HashMap;
use tracing::warn;

use registry_telemetry::EVENTS_UNKNOWN;

use crate::domain::{names, MemberMutation, MemberRecord, RegistryEvent};

pub use attributes::text_changed;
pub use keys::{key_added, key_revoked};
pub use ownership::{
    abi_changed, addr_changed, new_owner, new_resolver, reverse_node_changed, transfer,
};

/// Values every handler may need besides the event itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyContext {
    /// UTC seconds used as `eff_date` for new keys.
    pub applied_at: i64,
}

impl ApplyContext {
    /// Context stamped with the current time.
    pub fn now() -> Self {
        Self {
            applied_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Handler signature.
pub type EventApplier = fn(Option<&MemberRecord>, &RegistryEvent, &ApplyContext) -> MemberMutation;

/// Dispatch table from event name to handler.
#[derive(Clone)]
pub struct ApplierTable {
    handlers: HashMap<&'static str, EventApplier>,
}

impl Default for ApplierTable {
    fn default() -> Self {
        let mut handlers: HashMap<&'static str, EventApplier> = HashMap::new();
        handlers.insert(names::NEW_OWNER, new_owner);
        handlers.insert(names::TRANSFER, transfer);
        handlers.insert(names::NEW_RESOLVER, new_resolver);
        handlers.insert(names::ADDR_CHANGED, addr_changed);
        handlers.insert(names::ABI_CHANGED, abi_changed);
        handlers.insert(names::TEXT_CHANGED, text_changed);
        handlers.insert(names::ETH_PUB_KEY_ADDED, key_added);
        handlers.insert(names::ETH_PUB_KEY_REVOKED, key_revoked);
        handlers.insert(names::KOMGO_MESSAGING_PUB_KEY_ADDED, key_added);
        handlers.insert(names::KOMGO_MESSAGING_PUB_KEY_REVOKED, key_revoked);
        handlers.insert(names::VAKT_MESSAGING_PUB_KEY_ADDED, key_added);
        handlers.insert(names::VAKT_MESSAGING_PUB_KEY_REVOKED, key_revoked);
        handlers.insert(names::REVERSE_NODE_CHANGED, reverse_node_changed);
        Self { handlers }
    }
}

impl ApplierTable {
    /// True if `name` has a handler.
    pub fn handles(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Names with a handler.
    pub fn event_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run the handler for `name`. Unknown names map to `Noop`.
    pub fn apply(
        &self,
        name: &str,
        current: Option<&MemberRecord>,
        event: &RegistryEvent,
        ctx: &ApplyContext,
    ) -> MemberMutation {
        match self.handlers.get(name) {
            Some(handler) => handler(current, event, ctx),
            None => {
                warn!(event = %name, "No handler for event");
                EVENTS_UNKNOWN.inc();
                MemberMutation::Noop
            }
        }
    }
}

/// Shared guard: the handler found no record to update.
pub(crate) fn missing_member(event: &str, node: &str) -> MemberMutation {
    warn!(event = %event, node = %node, "Member not found for node");
    MemberMutation::Noop
}

/// Shared guard: a handler received an event it does not handle.
pub(crate) fn mismatched(handler: &str, event: &RegistryEvent) -> MemberMutation {
    warn!(handler = %handler, event = ?event, "Handler received a foreign event");
    MemberMutation::Noop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_tracked_events() {
        let table = ApplierTable::default();
        assert_eq!(table.event_names().len(), 13);
        assert!(table.handles("TextChanged"));
        assert!(!table.handles("NewTTL"));
    }

    #[test]
    fn test_unknown_event_is_noop() {
        let table = ApplierTable::default();
        let event = RegistryEvent::Unrecognized {
            name: "NewTTL".into(),
        };
        let mutation = table.apply("NewTTL", None, &event, &ApplyContext { applied_at: 0 });
        assert_eq!(mutation, MemberMutation::Noop);
    }
}
