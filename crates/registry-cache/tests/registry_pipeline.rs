//! # Registry Pipeline Integration Tests
//!
//! Drives the real services end to end over in-memory adapters: chain logs
//! go through the backfill, key verification gates the cache, and later
//! logs arrive over the bus through the relay and the live consumer.
//!
//! ## Test Categories
//!
//! 1. **Backfill** - chunked population, gate, verification
//! 2. **Live** - relay to bus to consumer, duplicates, redelivery
//! 3. **Key rotation** - supersede and revoke through real logs

use std::sync::Arc;

use registry_cache::ports::{MockChainRpc, MockContractArtifacts, MockEthSigner, MockRsaSigner};
use registry_cache::test_utils::{hash32, key_address, node_of, RegistryLogFactory};
use registry_cache::{
    BlockchainEventRelay, CacheEventService, CacheStore, ErrorKind, EventsProcessor,
    EventsProcessorApi, InMemoryCacheStore, KeyList, ManagedService, NodeKeyVerifier,
    PopulateRequest, PopulationState, PopulationStateGate, RegistryCacheConfig,
    RegistryCacheController, RegistryCachePopulation, RegistryCachePopulationService, TickOutcome,
};
use shared_bus::InMemoryMessageBus;
use shared_types::EventPosition;

// =============================================================================
// TEST HELPERS
// =============================================================================

const STATIC_ID: &str = "company-1";
const MODULUS: &str = "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1Wl";

struct Node {
    chain: Arc<MockChainRpc>,
    store: Arc<InMemoryCacheStore>,
    bus: InMemoryMessageBus,
    gate: Arc<PopulationStateGate>,
    processor: Arc<EventsProcessor>,
    live: Arc<CacheEventService>,
    population: RegistryCachePopulationService,
    controller: RegistryCacheController,
}

fn company_node() -> String {
    node_of(&hash32(0), &hash32(1))
}

/// Logs registering `company-1` with eth key seed 7 and the RSA modulus.
fn company_logs(logs: &RegistryLogFactory) -> Vec<shared_types::RawLog> {
    let node = company_node();
    vec![
        logs.new_owner((1, 0, 0), &hash32(0), &hash32(1), &logs.owner(1)),
        logs.new_resolver((1, 0, 1), &node, &logs.resolver),
        logs.text_changed((2, 0, 0), &node, "staticId", STATIC_ID),
        logs.text_changed((2, 0, 1), &node, "komgoProducts", r#"[{"productId":"KYC"}]"#),
        logs.eth_key_added((3, 0, 0), &node, 7, 0),
        logs.messaging_key_added(
            KeyList::KomgoMessagingPubKeys,
            (3, 1, 0),
            &node,
            &format!(r#"{{"kty":"RSA","n":"{}","e":"AQAB"}}"#, MODULUS),
            0,
        ),
    ]
}

fn build_node(chain_logs: Vec<shared_types::RawLog>, head: u64, eth_seed: u8, modulus: &str) -> Node {
    let logs = RegistryLogFactory::default();
    let chain = Arc::new(MockChainRpc::new(head, chain_logs));
    let store = Arc::new(InMemoryCacheStore::new());
    let bus = InMemoryMessageBus::new();
    let gate = Arc::new(PopulationStateGate::new());
    let config = RegistryCacheConfig {
        prepopulation_chunk: 2,
        company_static_id: Some(STATIC_ID.to_string()),
        ..RegistryCacheConfig::for_testing()
    };

    let processor = Arc::new(EventsProcessor::new(
        chain.clone(),
        Arc::new(MockContractArtifacts::new(logs.contracts())),
        store.clone(),
    ));
    let live = Arc::new(CacheEventService::new(
        processor.clone(),
        store.clone(),
        Arc::new(bus.consumer(config.consumer_id.clone())),
        &config,
    ));
    let verifier = NodeKeyVerifier::new(
        store.clone(),
        Arc::new(MockEthSigner::with_address(&key_address(eth_seed))),
        Arc::new(MockRsaSigner::with_modulus(modulus)),
        STATIC_ID,
    );
    let population = RegistryCachePopulationService::new(
        processor.clone(),
        store.clone(),
        chain.clone(),
        live.clone(),
        gate.clone(),
        &config,
    )
    .with_key_verifier(verifier);
    let controller =
        RegistryCacheController::new(processor.clone(), store.clone(), live.clone(), gate.clone());

    Node {
        chain,
        store,
        bus,
        gate,
        processor,
        live,
        population,
        controller,
    }
}

// =============================================================================
// BACKFILL
// =============================================================================

#[tokio::test]
async fn test_backfill_populates_verifies_and_opens_gate() {
    let logs = RegistryLogFactory::default();
    let node = build_node(company_logs(&logs), 5, 7, MODULUS);

    assert!(node.population.clear_populate_and_start_service().await.unwrap());
    assert_eq!(node.gate.state(), PopulationState::Complete);
    assert!(node.live.is_running());
    assert_eq!(
        node.chain.requests.lock().as_slice(),
        &[(1, 2), (3, 5)]
    );

    let members = node
        .controller
        .get_members(Some(r#"{"staticId":{"$in":["company-1"]}}"#))
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].node, company_node());
    assert!(members[0]
        .resolver
        .as_deref()
        .is_some_and(|resolver| resolver.eq_ignore_ascii_case(&logs.resolver)));
    assert!(
        node.controller
            .get_product_availability(STATIC_ID, "KYC")
            .await
            .unwrap()
            .is_available
    );
    assert_eq!(
        node.controller.last_processed_event().await.unwrap(),
        EventPosition::new(3, 1, 0)
    );

    node.live.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wrong_eth_key_keeps_gate_closed() {
    let logs = RegistryLogFactory::default();
    let node = build_node(company_logs(&logs), 5, 8, MODULUS);

    assert!(!node.population.clear_populate_and_start_service().await.unwrap());
    assert!(!node.live.is_running());
    let err = node.controller.get_members(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CacheNotReady);
    // The data stays for inspection.
    assert_eq!(node.store.member_count(), 1);
}

#[tokio::test]
async fn test_wrong_rsa_key_keeps_gate_closed() {
    let logs = RegistryLogFactory::default();
    let node = build_node(company_logs(&logs), 5, 7, "another-modulus");

    assert!(!node.population.clear_populate_and_start_service().await.unwrap());
    assert_eq!(node.gate.state(), PopulationState::InProgress);
}

#[tokio::test]
async fn test_undecodable_log_fails_population() {
    let logs = RegistryLogFactory::default();
    let mut chain_logs = company_logs(&logs);
    chain_logs.push(logs.undecodable((4, 0, 0)));
    let node = build_node(chain_logs, 5, 7, MODULUS);

    assert!(!node.population.clear_populate_and_start_service().await.unwrap());
    assert!(!node.live.is_running());
    // Chunk [1,2] landed before chunk [3,5] failed.
    assert_eq!(
        node.store.last_event_processed().await.unwrap(),
        Some(EventPosition::new(2, 0, 1))
    );
}

#[tokio::test]
async fn test_repopulation_starts_from_empty_store() {
    let logs = RegistryLogFactory::default();
    let node = build_node(company_logs(&logs), 5, 7, MODULUS);

    assert!(node.population.clear_populate_and_start_service().await.unwrap());
    assert!(node.population.clear_populate_and_start_service().await.unwrap());

    let member = node.store.find_by_node(&company_node()).await.unwrap().unwrap();
    assert_eq!(member.keys(KeyList::EthPubKeys).len(), 1);
    node.live.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_operator_rerun_of_range_does_not_duplicate_keys() {
    let logs = RegistryLogFactory::default();
    let company = company_node();
    let node = build_node(
        vec![
            logs.new_owner((1, 0, 0), &hash32(0), &hash32(1), &logs.owner(1)),
            logs.eth_key_added((2, 0, 0), &company, 7, 0),
        ],
        10,
        7,
        MODULUS,
    );

    for _ in 0..2 {
        node.controller
            .populate(PopulateRequest {
                from_block: 1,
                to_block: 10,
            })
            .await
            .unwrap();
    }

    let member = node.store.find_by_node(&company).await.unwrap().unwrap();
    assert_eq!(member.keys(KeyList::EthPubKeys).len(), 1);
    assert_eq!(
        node.store.last_event_processed().await.unwrap(),
        Some(EventPosition::new(2, 0, 0))
    );
    node.live.shutdown().await.unwrap();
}

// =============================================================================
// LIVE
// =============================================================================

#[tokio::test]
async fn test_relay_and_live_consumer_apply_new_events() {
    let logs = RegistryLogFactory::default();
    let node = build_node(company_logs(&logs), 5, 7, MODULUS);
    assert!(node.population.clear_populate_and_start_service().await.unwrap());
    node.live.stop().await.unwrap();

    let config = RegistryCacheConfig::for_testing();
    let relay = BlockchainEventRelay::new(
        node.chain.clone(),
        node.processor.clone(),
        Arc::new(node.bus.clone()),
        &config,
    );
    relay.set_cursor(node.population.synced_head());

    let company = company_node();
    node.chain
        .push_log(logs.text_changed((6, 0, 0), &company, "isMember", "true"));
    node.chain
        .push_log(logs.transfer((7, 0, 0), &company, &logs.owner(2)));
    node.chain.push_log(logs.foreign((7, 1, 0)));

    assert_eq!(relay.relay_once().await.unwrap(), 2);
    assert_eq!(node.bus.pending_count(&config.publisher_id), 2);

    assert!(matches!(node.live.poll_once().await.unwrap(), TickOutcome::Processed(_)));
    assert!(matches!(node.live.poll_once().await.unwrap(), TickOutcome::Processed(_)));
    assert_eq!(node.live.poll_once().await.unwrap(), TickOutcome::Idle);

    let member = node.store.find_by_node(&company).await.unwrap().unwrap();
    assert_eq!(member.owner, logs.owner(2));
    assert_eq!(
        node.store.last_event_processed().await.unwrap(),
        Some(EventPosition::new(7, 0, 0))
    );
}

#[tokio::test]
async fn test_replayed_backfill_events_are_discarded_live() {
    let logs = RegistryLogFactory::default();
    let node = build_node(company_logs(&logs), 5, 7, MODULUS);
    assert!(node.population.clear_populate_and_start_service().await.unwrap());
    node.live.stop().await.unwrap();

    // The event-management service republishes the whole history.
    let config = RegistryCacheConfig::for_testing();
    let relay = BlockchainEventRelay::new(
        node.chain.clone(),
        node.processor.clone(),
        Arc::new(node.bus.clone()),
        &config,
    );
    let replayed = relay.relay_once().await.unwrap();
    assert_eq!(replayed, company_logs(&logs).len());

    for _ in 0..replayed {
        assert_eq!(node.live.poll_once().await.unwrap(), TickOutcome::Duplicate);
    }
    let member = node.store.find_by_node(&company_node()).await.unwrap().unwrap();
    assert_eq!(member.keys(KeyList::KomgoMessagingPubKeys).len(), 1);
}

#[tokio::test]
async fn test_failed_message_does_not_block_later_events() {
    let logs = RegistryLogFactory::default();
    let node = build_node(company_logs(&logs), 5, 7, MODULUS);
    assert!(node.population.clear_populate_and_start_service().await.unwrap());
    node.live.stop().await.unwrap();

    let config = RegistryCacheConfig::for_testing();
    let relay = BlockchainEventRelay::new(
        node.chain.clone(),
        node.processor.clone(),
        Arc::new(node.bus.clone()),
        &config,
    );
    relay.set_cursor(5);
    let company = company_node();
    node.chain.push_log(logs.undecodable((6, 0, 0)));
    node.chain
        .push_log(logs.text_changed((7, 0, 0), &company, "isMember", "true"));
    assert_eq!(relay.relay_once().await.unwrap(), 2);

    assert_eq!(node.live.poll_once().await.unwrap(), TickOutcome::Failed);
    assert!(matches!(node.live.poll_once().await.unwrap(), TickOutcome::Processed(_)));
    assert_eq!(node.live.poll_once().await.unwrap(), TickOutcome::Idle);
    assert_eq!(
        node.store.last_event_processed().await.unwrap(),
        Some(EventPosition::new(7, 0, 0))
    );
    assert_eq!(node.bus.pending_count(&config.publisher_id), 0);
    assert_eq!(node.bus.unacked_count(&config.publisher_id), 1);

    // Closing hands the failed delivery back; a restarted consumer sees it
    // behind the watermark and acks it.
    node.live.shutdown().await.unwrap();
    assert_eq!(node.bus.pending_count(&config.publisher_id), 1);

    let restarted = CacheEventService::new(
        node.processor.clone(),
        node.store.clone(),
        Arc::new(node.bus.consumer("restarted")),
        &config,
    );
    assert_eq!(restarted.poll_once().await.unwrap(), TickOutcome::Duplicate);
    assert_eq!(restarted.poll_once().await.unwrap(), TickOutcome::Idle);
    assert_eq!(node.bus.unacked_count(&config.publisher_id), 0);
}

// =============================================================================
// KEY ROTATION
// =============================================================================

#[tokio::test]
async fn test_key_rotation_through_logs() {
    let logs = RegistryLogFactory::default();
    let company = company_node();
    let mut chain_logs = company_logs(&logs);
    chain_logs.push(logs.eth_key_added((4, 0, 0), &company, 9, 100));
    chain_logs.push(logs.key_revoked(KeyList::EthPubKeys, (4, 0, 1), &company, 0));
    chain_logs.push(logs.key_revoked(KeyList::EthPubKeys, (4, 0, 2), &company, 5));
    let node = build_node(chain_logs, 5, 9, MODULUS);

    assert!(node.population.clear_populate_and_start_service().await.unwrap());
    let member = node.store.find_by_node(&company).await.unwrap().unwrap();
    let keys = member.keys(KeyList::EthPubKeys);
    assert_eq!(keys.len(), 2);
    assert!(keys[0].revoked && !keys[0].current);
    assert!(keys[1].current && !keys[1].revoked);
    assert_eq!(keys[1].term_date, 100);
    assert_eq!(keys[1].address.as_deref(), Some(key_address(9).as_str()));
    node.live.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_batch_outcome_reports_head() {
    let logs = RegistryLogFactory::default();
    let node = build_node(company_logs(&logs), 50, 7, MODULUS);

    let outcome = node.processor.process_events_batch(1, 5).await.unwrap();
    assert_eq!(outcome.last_blockchain_block, 50);
    assert!(!outcome.service_started);
    assert_eq!(outcome.events_applied, 6);
}
