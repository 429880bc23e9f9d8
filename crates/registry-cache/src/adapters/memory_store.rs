//! # In-Memory Cache Store
//!
//! Members and watermark behind one `RwLock`, so a commit is atomic with
//! respect to every reader.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

use registry_telemetry::WATERMARK_BLOCK;
use shared_types::EventPosition;

use crate::domain::{
    apply_mutation, CommitOutcome, MemberFilter, MemberMutation, MemberRecord, RegistryCacheError,
};
use crate::ports::CacheStore;

#[derive(Default)]
struct StoreState {
    members: BTreeMap<String, MemberRecord>,
    watermark: Option<EventPosition>,
}

impl StoreState {
    fn advance(&mut self, position: EventPosition) {
        let next = match self.watermark {
            Some(current) if current >= position => current,
            _ => position,
        };
        self.watermark = Some(next);
        WATERMARK_BLOCK.set(next.block_number as f64);
    }
}

/// Cache store held in process memory.
#[derive(Default)]
pub struct InMemoryCacheStore {
    state: RwLock<StoreState>,
}

impl InMemoryCacheStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.state.read().members.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn clear_all(&self) -> Result<(), RegistryCacheError> {
        let mut state = self.state.write();
        state.members.clear();
        state.watermark = None;
        debug!("Cache cleared");
        Ok(())
    }

    async fn find_by_node(&self, node: &str) -> Result<Option<MemberRecord>, RegistryCacheError> {
        Ok(self.state.read().members.get(node).cloned())
    }

    async fn find_by_parent_and_label(
        &self,
        parent_node: &str,
        label: &str,
    ) -> Result<Option<MemberRecord>, RegistryCacheError> {
        Ok(self
            .state
            .read()
            .members
            .values()
            .find(|m| m.parent_node == parent_node && m.label == label)
            .cloned())
    }

    async fn get_members(
        &self,
        filter: &MemberFilter,
    ) -> Result<Vec<MemberRecord>, RegistryCacheError> {
        Ok(self
            .state
            .read()
            .members
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    async fn last_event_processed(&self) -> Result<Option<EventPosition>, RegistryCacheError> {
        Ok(self.state.read().watermark)
    }

    async fn create_or_update_watermark(
        &self,
        position: EventPosition,
    ) -> Result<(), RegistryCacheError> {
        self.state.write().advance(position);
        Ok(())
    }

    async fn commit(
        &self,
        mutation: MemberMutation,
        position: EventPosition,
    ) -> Result<CommitOutcome, RegistryCacheError> {
        let mut state = self.state.write();
        let outcome = match mutation.target_node().map(str::to_string) {
            Some(node) => {
                let current = state.members.get(&node).cloned();
                match apply_mutation(current, mutation) {
                    Some(record) => {
                        state.members.insert(node, record);
                        CommitOutcome::Written
                    }
                    None => CommitOutcome::WatermarkOnly,
                }
            }
            None => CommitOutcome::WatermarkOnly,
        };
        state.advance(position);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttributeKey, AttributeValue, KeyEntry, KeyList};
    use proptest::prelude::*;

    fn create(node: &str) -> MemberMutation {
        MemberMutation::CreateMember(MemberRecord::new(node, "0xparent", node, "0xowner"))
    }

    #[tokio::test]
    async fn test_commit_creates_and_advances() {
        let store = InMemoryCacheStore::new();
        let outcome = store
            .commit(create("0x01"), EventPosition::new(5, 0, 0))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Written);
        assert!(store.find_by_node("0x01").await.unwrap().is_some());
        assert_eq!(
            store.last_event_processed().await.unwrap(),
            Some(EventPosition::new(5, 0, 0))
        );
    }

    #[tokio::test]
    async fn test_commit_to_missing_node_moves_watermark_only() {
        let store = InMemoryCacheStore::new();
        let mutation = MemberMutation::UpdateOwner {
            node: "0x01".into(),
            owner: "0xB".into(),
        };
        let outcome = store
            .commit(mutation, EventPosition::new(1, 0, 0))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::WatermarkOnly);
        assert_eq!(store.member_count(), 0);
        assert!(store.last_event_processed().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_watermark_never_moves_back() {
        let store = InMemoryCacheStore::new();
        store
            .create_or_update_watermark(EventPosition::new(10, 2, 2))
            .await
            .unwrap();
        store
            .commit(MemberMutation::Noop, EventPosition::new(10, 1, 9))
            .await
            .unwrap();
        assert_eq!(
            store.last_event_processed().await.unwrap(),
            Some(EventPosition::new(10, 2, 2))
        );
    }

    #[tokio::test]
    async fn test_find_by_parent_and_label() {
        let store = InMemoryCacheStore::new();
        store
            .commit(create("0x01"), EventPosition::new(1, 0, 0))
            .await
            .unwrap();
        assert!(store
            .find_by_parent_and_label("0xparent", "0x01")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_parent_and_label("0xother", "0x01")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_members_filters() {
        let store = InMemoryCacheStore::new();
        for (i, node) in ["0x01", "0x02"].iter().enumerate() {
            store
                .commit(create(node), EventPosition::new(i as u64, 0, 0))
                .await
                .unwrap();
            store
                .commit(
                    MemberMutation::UpdateField {
                        node: node.to_string(),
                        key: AttributeKey::StaticId,
                        value: AttributeValue::Text(format!("id-{}", i)),
                    },
                    EventPosition::new(i as u64, 0, 1),
                )
                .await
                .unwrap();
        }
        let filter = MemberFilter::attribute_eq(AttributeKey::StaticId, "id-1");
        let members = store.get_members(&filter).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].node, "0x02");
        assert_eq!(store.get_members(&MemberFilter::all()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = InMemoryCacheStore::new();
        store
            .commit(create("0x01"), EventPosition::new(1, 0, 0))
            .await
            .unwrap();
        store.clear_all().await.unwrap();
        assert_eq!(store.member_count(), 0);
        assert_eq!(store.last_event_processed().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_key_rotation_through_store() {
        let store = InMemoryCacheStore::new();
        store
            .commit(create("0x01"), EventPosition::new(1, 0, 0))
            .await
            .unwrap();
        for i in 0..3u64 {
            store
                .commit(
                    MemberMutation::AddKey {
                        node: "0x01".into(),
                        list: KeyList::EthPubKeys,
                        entry: KeyEntry::new(format!("k{}", i), 0, 0),
                    },
                    EventPosition::new(2, 0, i),
                )
                .await
                .unwrap();
        }
        let record = store.find_by_node("0x01").await.unwrap().unwrap();
        assert_eq!(record.eth_pub_keys.len(), 3);
        assert_eq!(record.eth_pub_keys.iter().filter(|k| k.current).count(), 1);
        assert!(record.eth_pub_keys[2].current);
    }

    proptest! {
        #[test]
        fn prop_watermark_is_max_of_commits(
            positions in proptest::collection::vec((0u64..50, 0u64..5, 0u64..5), 1..40)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = InMemoryCacheStore::new();
            let mut previous: Option<EventPosition> = None;
            for (b, t, l) in positions.iter().copied() {
                let position = EventPosition::new(b, t, l);
                let watermark = runtime.block_on(async {
                    store.commit(MemberMutation::Noop, position).await.unwrap();
                    store.last_event_processed().await.unwrap()
                });
                if let Some(prev) = previous {
                    prop_assert!(watermark >= Some(prev));
                }
                previous = watermark;
            }
            let expected = positions
                .iter()
                .map(|(b, t, l)| EventPosition::new(*b, *t, *l))
                .max();
            prop_assert_eq!(previous, expected);
        }
    }
}
