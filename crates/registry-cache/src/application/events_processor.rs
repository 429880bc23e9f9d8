//! # Events Processor
//!
//! Fetches registry logs, decodes them against the deployed contract
//! catalog and applies each event to the store through the applier table.
//!
//! A batch is decoded in full before anything is written: one undecodable
//! log from a registry contract aborts the batch with zero mutations.
//! Applications are serialised by `apply_lock` so the watermark check, the
//! read of the current record and the commit that follows cannot interleave
//! with another application. An event at or behind the watermark is never
//! committed twice, whichever producer delivers it.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use registry_telemetry::{log_chain_event, time_histogram, BATCH_DURATION, EVENTS_APPLIED, LOGS_SKIPPED};
use shared_types::RawLog;

use crate::abi::EventCatalog;
use crate::appliers::{ApplierTable, ApplyContext};
use crate::domain::{
    BatchOutcome, CommitOutcome, DecodedEvent, MemberLookup, ProcessedEvent, RegistryCacheError,
};
use crate::ports::{CacheStore, ChainRpc, ContractArtifacts, EventsProcessorApi};

/// Events processor service.
pub struct EventsProcessor {
    chain: Arc<dyn ChainRpc>,
    artifacts: Arc<dyn ContractArtifacts>,
    store: Arc<dyn CacheStore>,
    appliers: ApplierTable,
    catalog: RwLock<Option<Arc<EventCatalog>>>,
    apply_lock: Mutex<()>,
}

impl EventsProcessor {
    /// Create a processor over the given ports.
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        artifacts: Arc<dyn ContractArtifacts>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            chain,
            artifacts,
            store,
            appliers: ApplierTable::default(),
            catalog: RwLock::new(None),
            apply_lock: Mutex::new(()),
        }
    }

    /// Decode every log, keeping only those from registry contracts.
    fn decode_all(
        catalog: &EventCatalog,
        logs: &[RawLog],
    ) -> Result<(Vec<DecodedEvent>, usize), RegistryCacheError> {
        let mut decoded = Vec::with_capacity(logs.len());
        let mut skipped = 0;
        for log in logs {
            match catalog.decode(log) {
                Ok(Some(event)) => decoded.push(event),
                Ok(None) => {
                    skipped += 1;
                    LOGS_SKIPPED.inc();
                    debug!(address = %log.address, "Skipping log from unknown contract");
                }
                Err(e) => {
                    warn!(
                        block_number = log.block_number,
                        log_index = log.log_index,
                        error = %e,
                        "Undecodable registry log"
                    );
                    return Err(e.into());
                }
            }
        }
        Ok((decoded, skipped))
    }

    /// Look up the current record, run the handler and commit the mutation
    /// together with the watermark advance.
    async fn apply(
        &self,
        decoded: DecodedEvent,
        ctx: &ApplyContext,
    ) -> Result<ProcessedEvent, RegistryCacheError> {
        let _guard = self.apply_lock.lock().await;

        if let Some(watermark) = self.store.last_event_processed().await? {
            if decoded.position <= watermark {
                log_chain_event!(
                    debug,
                    "Event already applied, not committing",
                    decoded.position,
                    event = %decoded.name,
                    watermark = %watermark
                );
                return Ok(ProcessedEvent {
                    name: decoded.name,
                    outcome: CommitOutcome::Duplicate,
                });
            }
        }

        let current = match decoded.event.lookup() {
            MemberLookup::ByNode(node) => self.store.find_by_node(node).await?,
            MemberLookup::ByParentAndLabel { parent_node, label } => {
                self.store
                    .find_by_parent_and_label(parent_node, label)
                    .await?
            }
            MemberLookup::None => None,
        };

        let mutation = self
            .appliers
            .apply(&decoded.name, current.as_ref(), &decoded.event, ctx);
        let kind = mutation.kind();
        let outcome = self.store.commit(mutation, decoded.position).await?;

        EVENTS_APPLIED.with_label_values(&[decoded.name.as_str()]).inc();
        log_chain_event!(
            debug,
            "Event applied",
            decoded.position,
            event = %decoded.name,
            mutation = kind
        );

        Ok(ProcessedEvent {
            name: decoded.name,
            outcome,
        })
    }
}

#[async_trait]
impl EventsProcessorApi for EventsProcessor {
    async fn process_events_batch(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<BatchOutcome, RegistryCacheError> {
        let _timer = time_histogram!(BATCH_DURATION);
        let catalog = self.deployed_contracts().await?;

        let logs = self.chain.get_past_logs(from_block, to_block).await?;
        let (decoded, logs_skipped) = Self::decode_all(&catalog, &logs)?;

        let ctx = ApplyContext::now();
        let mut events_applied = 0;
        for event in decoded {
            let processed = self.apply(event, &ctx).await?;
            if processed.outcome != CommitOutcome::Duplicate {
                events_applied += 1;
            }
        }

        let head = self.chain.get_block_number().await?;
        let outcome = BatchOutcome {
            start_block: from_block,
            end_block: to_block,
            last_block_processed: to_block,
            last_blockchain_block: head,
            service_started: to_block >= head,
            events_applied,
            logs_skipped,
        };
        info!(
            from_block,
            to_block,
            head,
            events_applied,
            logs_skipped,
            "Processed block range"
        );
        Ok(outcome)
    }

    async fn process_event(&self, log: RawLog) -> Result<ProcessedEvent, RegistryCacheError> {
        let catalog = self.deployed_contracts().await?;
        let Some(decoded) = catalog.decode(&log)? else {
            LOGS_SKIPPED.inc();
            debug!(
                address = %log.address,
                block_number = log.block_number,
                log_index = log.log_index,
                "Skipping live log from unknown contract"
            );
            let name = log
                .topics
                .first()
                .and_then(|topic| catalog.event_for_topic(topic))
                .map(|event| event.name.clone())
                .unwrap_or_default();
            return Ok(ProcessedEvent {
                name,
                outcome: CommitOutcome::Skipped,
            });
        };
        self.apply(decoded, &ApplyContext::now()).await
    }

    async fn deployed_contracts(&self) -> Result<Arc<EventCatalog>, RegistryCacheError> {
        if let Some(catalog) = self.catalog.read().await.as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let mut slot = self.catalog.write().await;
        if let Some(catalog) = slot.as_ref() {
            return Ok(Arc::clone(catalog));
        }
        let contracts = self.artifacts.deployed_contracts().await?;
        let catalog = Arc::new(EventCatalog::from_contracts(&contracts)?);
        info!(
            contracts = catalog.contracts().len(),
            events = catalog.routing_keys().len(),
            "Resolved deployed contracts"
        );
        *slot = Some(Arc::clone(&catalog));
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryCacheStore;
    use crate::domain::{AttributeKey, AttributeValue, KeyList, MemberFilter};
    use crate::ports::{MockChainRpc, MockContractArtifacts};
    use crate::test_utils::{hash32, node_of, RegistryLogFactory};
    use shared_types::EventPosition;
    use std::sync::atomic::Ordering;

    struct Fixture {
        chain: Arc<MockChainRpc>,
        artifacts: Arc<MockContractArtifacts>,
        store: Arc<InMemoryCacheStore>,
        processor: EventsProcessor,
        logs: RegistryLogFactory,
    }

    fn fixture(head: u64) -> Fixture {
        let logs = RegistryLogFactory::default();
        let chain = Arc::new(MockChainRpc::new(head, vec![]));
        let artifacts = Arc::new(MockContractArtifacts::new(logs.contracts()));
        let store = Arc::new(InMemoryCacheStore::new());
        let processor = EventsProcessor::new(chain.clone(), artifacts.clone(), store.clone());
        Fixture {
            chain,
            artifacts,
            store,
            processor,
            logs,
        }
    }

    #[tokio::test]
    async fn test_batch_creates_member_and_advances_watermark() {
        let f = fixture(10);
        let node = node_of(&hash32(0), &hash32(1));
        f.chain
            .push_log(f.logs.new_owner((3, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1)));
        f.chain
            .push_log(f.logs.text_changed((4, 1, 0), &node, "staticId", "company-a"));

        let outcome = f.processor.process_events_batch(1, 10).await.unwrap();
        assert_eq!(outcome.events_applied, 2);
        assert!(outcome.service_started);

        let member = f.store.find_by_node(&node).await.unwrap().unwrap();
        assert_eq!(member.static_id(), Some("company-a"));
        assert_eq!(
            f.store.last_event_processed().await.unwrap(),
            Some(EventPosition::new(4, 1, 0))
        );
    }

    #[tokio::test]
    async fn test_undecodable_log_aborts_whole_batch() {
        let f = fixture(10);
        f.chain
            .push_log(f.logs.new_owner((1, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1)));
        f.chain.push_log(f.logs.undecodable((2, 0, 0)));

        let err = f.processor.process_events_batch(1, 10).await.unwrap_err();
        assert!(matches!(err, RegistryCacheError::EventValidation(_)));
        assert_eq!(f.store.member_count(), 0);
        assert_eq!(f.store.last_event_processed().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_foreign_logs_are_skipped() {
        let f = fixture(10);
        f.chain.push_log(f.logs.foreign((1, 0, 0)));
        f.chain
            .push_log(f.logs.new_owner((2, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1)));

        let outcome = f.processor.process_events_batch(1, 10).await.unwrap();
        assert_eq!(outcome.logs_skipped, 1);
        assert_eq!(outcome.events_applied, 1);
        assert_eq!(f.store.member_count(), 1);
    }

    #[tokio::test]
    async fn test_batch_below_head_does_not_start_service() {
        let f = fixture(500);
        let outcome = f.processor.process_events_batch(1, 100).await.unwrap();
        assert_eq!(outcome.last_blockchain_block, 500);
        assert_eq!(outcome.last_block_processed, 100);
        assert!(!outcome.service_started);
    }

    #[tokio::test]
    async fn test_rpc_failure_is_blockchain_connection() {
        let f = fixture(10);
        f.chain.fail_logs.store(true, Ordering::SeqCst);
        let err = f.processor.process_events_batch(1, 10).await.unwrap_err();
        assert!(matches!(err, RegistryCacheError::BlockchainConnection(_)));
    }

    #[tokio::test]
    async fn test_catalog_resolved_once() {
        let f = fixture(10);
        f.processor.process_events_batch(1, 5).await.unwrap();
        f.processor.process_events_batch(6, 10).await.unwrap();
        f.processor.deployed_contracts().await.unwrap();
        assert_eq!(f.artifacts.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_process_event_skips_foreign_log() {
        let f = fixture(10);
        let skipped_before = LOGS_SKIPPED.get();
        let processed = f
            .processor
            .process_event(f.logs.foreign((1, 0, 0)))
            .await
            .unwrap();
        assert_eq!(processed.outcome, CommitOutcome::Skipped);
        assert!(LOGS_SKIPPED.get() > skipped_before);
        assert_eq!(f.store.member_count(), 0);
        assert_eq!(f.store.last_event_processed().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rerun_range_does_not_reapply_events() {
        let f = fixture(10);
        let node = node_of(&hash32(0), &hash32(1));
        f.chain
            .push_log(f.logs.new_owner((1, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1)));
        f.chain.push_log(f.logs.eth_key_added((2, 0, 0), &node, 7, 0));

        let first = f.processor.process_events_batch(1, 10).await.unwrap();
        assert_eq!(first.events_applied, 2);
        let second = f.processor.process_events_batch(1, 10).await.unwrap();
        assert_eq!(second.events_applied, 0);

        let member = f.store.find_by_node(&node).await.unwrap().unwrap();
        assert_eq!(member.keys(KeyList::EthPubKeys).len(), 1);
        assert_eq!(
            f.store.last_event_processed().await.unwrap(),
            Some(EventPosition::new(2, 0, 0))
        );
    }

    #[tokio::test]
    async fn test_event_at_watermark_is_duplicate() {
        let f = fixture(10);
        f.store
            .create_or_update_watermark(EventPosition::new(5, 0, 0))
            .await
            .unwrap();

        let processed = f
            .processor
            .process_event(f.logs.new_owner((5, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1)))
            .await
            .unwrap();
        assert_eq!(processed.outcome, CommitOutcome::Duplicate);
        assert_eq!(f.store.member_count(), 0);

        let processed = f
            .processor
            .process_event(f.logs.new_owner((5, 0, 1), &hash32(0), &hash32(1), &f.logs.owner(1)))
            .await
            .unwrap();
        assert_eq!(processed.outcome, CommitOutcome::Written);
    }

    #[tokio::test]
    async fn test_process_event_on_missing_node_moves_watermark_only() {
        let f = fixture(10);
        let processed = f
            .processor
            .process_event(f.logs.transfer((5, 0, 0), &hash32(7), &f.logs.owner(2)))
            .await
            .unwrap();
        assert_eq!(processed.outcome, CommitOutcome::WatermarkOnly);
        assert_eq!(
            f.store.last_event_processed().await.unwrap(),
            Some(EventPosition::new(5, 0, 0))
        );
    }

    #[tokio::test]
    async fn test_unhandled_event_is_noop() {
        let f = fixture(10);
        let processed = f
            .processor
            .process_event(f.logs.new_ttl((2, 0, 0), &hash32(3), 60))
            .await
            .unwrap();
        assert_eq!(processed.name, "NewTTL");
        assert_eq!(processed.outcome, CommitOutcome::WatermarkOnly);
    }

    #[tokio::test]
    async fn test_text_changed_is_idempotent_key_append_is_not() {
        let f = fixture(10);
        let node = node_of(&hash32(0), &hash32(1));
        f.processor
            .process_event(f.logs.new_owner((1, 0, 0), &hash32(0), &hash32(1), &f.logs.owner(1)))
            .await
            .unwrap();

        for i in 0..2 {
            f.processor
                .process_event(f.logs.text_changed((2, 0, i), &node, "isMember", "true"))
                .await
                .unwrap();
            f.processor
                .process_event(f.logs.messaging_key_added(
                    KeyList::KomgoMessagingPubKeys,
                    (3, 0, i),
                    &node,
                    r#"{"n":"abc"}"#,
                    0,
                ))
                .await
                .unwrap();
        }

        let member = f.store.find_by_node(&node).await.unwrap().unwrap();
        assert_eq!(
            member.attribute(AttributeKey::IsMember),
            Some(&AttributeValue::Bool(true))
        );
        let keys = member.keys(KeyList::KomgoMessagingPubKeys);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.iter().filter(|k| k.current).count(), 1);
        assert!(keys[1].current);

        let filtered = f
            .store
            .get_members(&MemberFilter::attribute_eq(AttributeKey::IsMember, true))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }
}
