// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::conflict::ConflictRecord;
use crate::error::NetworkError;
use crate::network::TransportType;
use crate::op::Priority;
use crate::storage::MemoryStorage;
use crate::test_support::{Gate, MockTransport};
use crate::transport::Method;

struct Harness {
    coordinator: SyncCoordinator<MockTransport, MemoryStorage>,
    transport: MockTransport,
    network: watch::Sender<NetworkSample>,
}

fn test_config() -> EngineConfig {
    EngineConfig { base_delay_ms: 0, ..EngineConfig::default() }
}

fn wifi() -> NetworkSample {
    NetworkSample::connected(TransportType::Wifi, Some(10_000), false)
}

fn offline() -> NetworkSample {
    NetworkSample::disconnected(Utc::now())
}

fn build(config: EngineConfig, storage: MemoryStorage, sample: NetworkSample) -> Harness {
    let transport = MockTransport::new();
    let (network, rx) = watch::channel(sample);
    let coordinator =
        CoordinatorBuilder::new(config, transport.clone(), storage, rx).build().unwrap();
    Harness { coordinator, transport, network }
}

fn harness(sample: NetworkSample) -> Harness {
    build(test_config(), MemoryStorage::new(), sample)
}

fn update(entity: &str, key: &str, state: Value) -> NewOperation {
    NewOperation::json_update("plot", entity, 3, &state, key).unwrap()
}

fn stored(h: &Harness, entity: &str) -> Option<(Value, u64)> {
    h.coordinator
        .storage()
        .get(entity)
        .unwrap()
        .map(|e| (serde_json::from_slice(&e.payload).unwrap(), e.version))
}

fn base_payload() -> Value {
    json!({"name": "north", "acres": 3, "crop": "corn"})
}

/// Storage holding the base snapshot at version 3.
fn seeded() -> MemoryStorage {
    MemoryStorage::new().with_entity("p-1", &serde_json::to_vec(&base_payload()).unwrap(), 3)
}

fn push_remote(transport: &MockTransport, version: u64, payload: Value) {
    let body = json!({"version": version, "payload": payload}).to_string();
    transport.push_response(200, &body);
}

#[tokio::test]
async fn offline_makes_no_transport_calls() {
    let h = harness(offline());
    let id = h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    let report = h.coordinator.run_cycle().await;
    assert!(report.is_offline());
    assert_eq!(report.dispatched, 0);
    assert_eq!(h.transport.request_count(), 0);
    assert_eq!(h.coordinator.state_of(id), Some(OperationState::Queued));

    h.network.send(wifi()).unwrap();
    let report = h.coordinator.run_cycle().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn success_commits_at_next_version() {
    let h = harness(wifi());
    let id = h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    let report = h.coordinator.run_cycle().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.coordinator.state_of(id), Some(OperationState::Succeeded));
    assert_eq!(stored(&h, "p-1"), Some((json!({"acres": 4}), 4)));
    assert!(h.coordinator.pending().is_empty());

    let request = &h.transport.requests()[0];
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.expected_version, 3);
    assert_eq!(request.idempotency_key, "k1");
}

#[tokio::test]
async fn success_uses_acknowledged_version() {
    let h = harness(wifi());
    h.transport.push_response(200, r#"{"version": 12}"#);
    h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    h.coordinator.run_cycle().await;
    assert_eq!(stored(&h, "p-1").map(|(_, v)| v), Some(12));
}

#[tokio::test]
async fn delete_removes_local_entity() {
    let h = build(test_config(), seeded(), wifi());
    h.coordinator.enqueue(NewOperation::delete("plot", "p-1", 3, "del-1")).unwrap();

    let report = h.coordinator.run_cycle().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.transport.requests()[0].method, Method::Delete);
    assert_eq!(stored(&h, "p-1"), None);
}

#[tokio::test]
async fn duplicate_key_is_rejected_without_network_call() {
    let h = harness(wifi());
    h.coordinator.enqueue(update("p-1", "txn-42", json!({"acres": 4}))).unwrap();
    let err = h.coordinator.enqueue(update("p-2", "txn-42", json!({"acres": 5}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operation(SyncOperationError::AlreadyInProgress));

    h.coordinator.run_cycle().await;
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn queue_full_is_rejected() {
    let config = EngineConfig { max_pending: 1, ..test_config() };
    let h = build(config, MemoryStorage::new(), offline());
    h.coordinator.enqueue(update("p-1", "k1", json!({}))).unwrap();
    let err = h.coordinator.enqueue(update("p-2", "k2", json!({}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operation(SyncOperationError::QueueFull));
}

#[tokio::test]
async fn malformed_operation_is_rejected() {
    let h = harness(offline());
    let err = h.coordinator.enqueue(update("p-1", " ", json!({}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operation(SyncOperationError::InvalidOperation));

    let bad = NewOperation::new("plot", "p-1", OperationKind::Update, "k1")
        .payload(b"{not json".to_vec(), ContentType::Json);
    assert!(h.coordinator.enqueue(bad).is_err());
    assert!(h.coordinator.pending().is_empty());
}

#[tokio::test]
async fn three_timeouts_exhaust_retries_on_the_third() {
    let h = harness(wifi());
    for _ in 0..3 {
        h.transport.push_error(TransportError::Timeout(Duration::from_secs(1)));
    }
    let id = h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    let first = h.coordinator.run_cycle().await;
    assert_eq!((first.retried, first.failed), (1, 0));
    assert_eq!(h.coordinator.pending()[0].retry_count, 1);
    assert_eq!(h.coordinator.state_of(id), Some(OperationState::Queued));

    let second = h.coordinator.run_cycle().await;
    assert_eq!((second.retried, second.failed), (1, 0));
    assert_eq!(h.coordinator.pending()[0].retry_count, 2);

    let third = h.coordinator.run_cycle().await;
    assert_eq!((third.retried, third.failed), (0, 1));
    assert_eq!(
        h.coordinator.state_of(id),
        Some(OperationState::Failed(SyncOperationError::MaxRetriesExceeded.into()))
    );
    assert_eq!(h.transport.request_count(), 3);
    assert_eq!(stored(&h, "p-1"), None);
}

#[tokio::test]
async fn non_retryable_error_fails_immediately() {
    let h = harness(wifi());
    h.transport.push_response(403, "{}");
    let id = h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    let report = h.coordinator.run_cycle().await;
    assert_eq!((report.retried, report.failed), (0, 1));
    assert_eq!(
        h.coordinator.state_of(id),
        Some(OperationState::Failed(NetworkError::Forbidden.into()))
    );
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_waits_for_backoff() {
    let config = EngineConfig { base_delay_ms: 1_000, ..EngineConfig::default() };
    let h = build(config, MemoryStorage::new(), wifi());
    h.transport.push_response(503, "unavailable");
    h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    assert_eq!(h.coordinator.run_cycle().await.retried, 1);

    // First retry waits base * 2^1.
    tokio::time::advance(Duration::from_millis(1_500)).await;
    assert_eq!(h.coordinator.run_cycle().await.dispatched, 0);

    tokio::time::advance(Duration::from_millis(500)).await;
    assert_eq!(h.coordinator.run_cycle().await.succeeded, 1);
}

struct CountingRefresher(Arc<AtomicUsize>);

impl CredentialRefresher for CountingRefresher {
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[tokio::test]
async fn expired_token_refreshes_then_retries() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let transport = MockTransport::new();
    transport.push_response(401, r#"{"code": "token_expired"}"#);
    let (_network, rx) = watch::channel(wifi());
    let coordinator = CoordinatorBuilder::new(test_config(), transport.clone(), MemoryStorage::new(), rx)
        .credential_refresher(CountingRefresher(Arc::clone(&refreshes)))
        .build()
        .unwrap();
    coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    assert_eq!(coordinator.run_cycle().await.retried, 1);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.run_cycle().await.succeeded, 1);
}

#[tokio::test]
async fn expired_token_without_refresher_fails() {
    let h = harness(wifi());
    h.transport.push_response(401, r#"{"code": "token_expired"}"#);
    let id = h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    assert_eq!(h.coordinator.run_cycle().await.failed, 1);
    assert_eq!(
        h.coordinator.state_of(id),
        Some(OperationState::Failed(AuthError::TokenExpired.into()))
    );
}

#[tokio::test]
async fn disjoint_conflict_merges_and_commits_next_version() {
    let h = build(test_config(), seeded(), wifi());
    h.transport.push_response(409, r#"{"current_version": 5}"#);
    push_remote(&h.transport, 5, json!({"name": "north field", "acres": 3, "crop": "corn"}));

    let local = json!({"name": "north", "acres": 5, "crop": "corn"});
    let id = h.coordinator.enqueue(update("p-1", "k1", local)).unwrap();

    let report = h.coordinator.run_cycle().await;
    assert_eq!(report.auto_merged, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.coordinator.state_of(id), Some(OperationState::Succeeded));

    let merged = json!({"name": "north field", "acres": 5, "crop": "corn"});
    assert_eq!(stored(&h, "p-1"), Some((merged.clone(), 6)));

    let requests = h.transport.requests();
    let methods: Vec<_> = requests.iter().map(|r| (r.method, r.expected_version)).collect();
    assert_eq!(methods, vec![(Method::Put, 3), (Method::Get, 3), (Method::Put, 5)]);
    let sent: Value = serde_json::from_slice(&requests[2].body).unwrap();
    assert_eq!(sent, merged);
}

#[tokio::test]
async fn overlapping_conflict_is_deferred_by_default() {
    let h = build(test_config(), seeded(), wifi());
    h.transport.push_response(409, r#"{"current_version": 5}"#);
    push_remote(&h.transport, 5, json!({"name": "north", "acres": 4, "crop": "corn"}));

    let local = json!({"name": "north", "acres": 5, "crop": "corn"});
    let id = h.coordinator.enqueue(update("p-1", "k1", local)).unwrap();

    let report = h.coordinator.run_cycle().await;
    assert_eq!((report.conflicts_surfaced, report.failed), (1, 1));
    assert_eq!(
        h.coordinator.state_of(id),
        Some(OperationState::Failed(ConflictKind::UnresolvableConflict.into()))
    );
    assert_eq!(stored(&h, "p-1"), Some((base_payload(), 3)));
}

#[tokio::test]
async fn remote_deletion_surfaces_deletion_conflict() {
    let h = build(test_config(), seeded(), wifi());
    h.transport.push_response(409, r#"{"current_version": 5, "kind": "deleted"}"#);
    h.transport.push_response(404, "");

    let id = h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 5}))).unwrap();
    h.coordinator.run_cycle().await;
    assert_eq!(
        h.coordinator.state_of(id),
        Some(OperationState::Failed(ConflictKind::DeletionConflict.into()))
    );
}

#[tokio::test]
async fn sequential_offline_edits_rebase_on_prior_commit() {
    let h = build(test_config(), seeded(), offline());
    let first = json!({"name": "north", "acres": 4, "crop": "corn"});
    let second = json!({"name": "north", "acres": 4, "crop": "wheat"});
    let a = h.coordinator.enqueue(update("p-1", "a", first)).unwrap();
    let b = h.coordinator.enqueue(update("p-1", "b", second.clone())).unwrap();
    h.transport.push_response(200, r#"{"version": 4}"#);
    h.transport.push_response(200, r#"{"version": 5}"#);

    h.network.send(wifi()).unwrap();
    assert_eq!(h.coordinator.run_cycle().await.succeeded, 1);
    assert_eq!(h.coordinator.pending()[0].base_version, 4);
    assert_eq!(h.coordinator.run_cycle().await.succeeded, 1);

    assert_eq!(h.coordinator.state_of(a), Some(OperationState::Succeeded));
    assert_eq!(h.coordinator.state_of(b), Some(OperationState::Succeeded));
    let methods: Vec<_> =
        h.transport.requests().iter().map(|r| (r.method, r.expected_version)).collect();
    assert_eq!(methods, vec![(Method::Put, 3), (Method::Put, 4)]);
    assert_eq!(stored(&h, "p-1"), Some((second, 5)));
}

#[tokio::test]
async fn later_edit_merges_against_own_earlier_commit() {
    let h = build(test_config(), seeded(), offline());
    let first = json!({"name": "north", "acres": 4, "crop": "corn"});
    let second = json!({"name": "north", "acres": 4, "crop": "wheat"});
    h.coordinator.enqueue(update("p-1", "a", first)).unwrap();
    let b = h.coordinator.enqueue(update("p-1", "b", second)).unwrap();
    h.transport.push_response(200, r#"{"version": 4}"#);
    h.transport.push_response(409, r#"{"current_version": 5}"#);
    push_remote(&h.transport, 5, json!({"name": "north field", "acres": 4, "crop": "corn"}));

    h.network.send(wifi()).unwrap();
    h.coordinator.run_cycle().await;
    let report = h.coordinator.run_cycle().await;
    assert_eq!((report.auto_merged, report.succeeded), (1, 1));
    assert_eq!(h.coordinator.state_of(b), Some(OperationState::Succeeded));

    let methods: Vec<_> =
        h.transport.requests().iter().map(|r| (r.method, r.expected_version)).collect();
    assert_eq!(
        methods,
        vec![(Method::Put, 3), (Method::Put, 4), (Method::Get, 4), (Method::Put, 5)]
    );
    let merged = json!({"name": "north field", "acres": 4, "crop": "wheat"});
    assert_eq!(stored(&h, "p-1"), Some((merged, 6)));
}

fn build_with_handler(
    transport: &MockTransport,
    handler: impl ConflictHandler + 'static,
) -> SyncCoordinator<MockTransport, MemoryStorage> {
    let (_network, rx) = watch::channel(wifi());
    CoordinatorBuilder::new(test_config(), transport.clone(), seeded(), rx)
        .conflict_handler(handler)
        .build()
        .unwrap()
}

#[tokio::test]
async fn keep_remote_adopts_remote_state() {
    let transport = MockTransport::new();
    transport.push_response(409, r#"{"current_version": 5, "kind": "concurrent_modification"}"#);
    let remote = json!({"name": "north field", "acres": 3, "crop": "corn"});
    push_remote(&transport, 5, remote.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_handler = Arc::clone(&seen);
    let coordinator = build_with_handler(&transport, move |record: &ConflictRecord| {
        seen_by_handler.lock().unwrap().push(record.kind);
        ResolutionDecision::KeepRemote
    });
    let id = coordinator.enqueue(update("p-1", "k1", json!({"name": "north", "acres": 5, "crop": "corn"}))).unwrap();

    let report = coordinator.run_cycle().await;
    assert_eq!((report.conflicts_surfaced, report.succeeded), (1, 1));
    assert_eq!(*seen.lock().unwrap(), vec![ConflictKind::ConcurrentModification]);
    assert_eq!(coordinator.state_of(id), Some(OperationState::Succeeded));

    let entity = coordinator.storage().get("p-1").unwrap().unwrap();
    assert_eq!(entity.version, 5);
    assert_eq!(serde_json::from_slice::<Value>(&entity.payload).unwrap(), remote);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn use_merged_submits_caller_payload() {
    let transport = MockTransport::new();
    transport.push_response(409, r#"{"current_version": 5}"#);
    push_remote(&transport, 5, json!({"name": "north", "acres": 4, "crop": "corn"}));

    let chosen = json!({"name": "north", "acres": 9, "crop": "corn"});
    let decision = ResolutionDecision::UseMerged(chosen.clone());
    let coordinator = build_with_handler(&transport, move |_: &ConflictRecord| decision.clone());
    coordinator.enqueue(update("p-1", "k1", json!({"name": "north", "acres": 5, "crop": "corn"}))).unwrap();

    let report = coordinator.run_cycle().await;
    assert_eq!(report.succeeded, 1);

    let last = transport.requests().pop().unwrap();
    assert_eq!((last.method, last.expected_version), (Method::Put, 5));
    assert_eq!(serde_json::from_slice::<Value>(&last.body).unwrap(), chosen);
    assert_eq!(coordinator.storage().get("p-1").unwrap().unwrap().version, 6);
}

#[tokio::test]
async fn keep_local_resubmits_against_remote_version() {
    let transport = MockTransport::new();
    transport.push_response(409, r#"{"current_version": 5, "kind": "ownership"}"#);
    push_remote(&transport, 5, json!({"name": "north", "acres": 4, "crop": "corn"}));

    let coordinator = build_with_handler(&transport, |_: &ConflictRecord| ResolutionDecision::KeepLocal);
    let local = json!({"name": "north", "acres": 5, "crop": "corn"});
    coordinator.enqueue(update("p-1", "k1", local.clone())).unwrap();

    assert_eq!(coordinator.run_cycle().await.succeeded, 1);
    let last = transport.requests().pop().unwrap();
    assert_eq!(last.expected_version, 5);
    assert_eq!(serde_json::from_slice::<Value>(&last.body).unwrap(), local);
}

#[tokio::test]
async fn cancel_queued_operation_removes_it() {
    let h = harness(offline());
    let id = h.coordinator.enqueue(update("p-1", "k1", json!({}))).unwrap();

    assert!(h.coordinator.cancel(id));
    assert_eq!(h.coordinator.state_of(id), Some(OperationState::Cancelled));
    assert!(h.coordinator.pending().is_empty());
    assert!(!h.coordinator.cancel(id));
    assert!(!h.coordinator.cancel(OperationId(99)));

    h.network.send(wifi()).unwrap();
    h.coordinator.run_cycle().await;
    assert_eq!(h.transport.request_count(), 0);
}

#[tokio::test]
async fn cancel_in_flight_discards_result() {
    let gate = Gate::default();
    let transport = MockTransport::gated(gate.clone());
    let (_network, rx) = watch::channel(wifi());
    let coordinator =
        CoordinatorBuilder::new(test_config(), transport.clone(), MemoryStorage::new(), rx)
            .build()
            .unwrap();
    let id = coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();

    let cycle = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run_cycle().await })
    };
    gate.entered.notified().await;
    assert!(coordinator.cancel(id));
    assert_eq!(coordinator.state_of(id), Some(OperationState::InFlight));
    gate.release.notify_one();

    let report = cycle.await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(coordinator.state_of(id), Some(OperationState::Cancelled));
    assert!(coordinator.storage().is_empty());
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn cancel_during_conflict_resolution_discards_result() {
    let gate = Gate::default();
    let transport = MockTransport::gated(gate.clone());
    transport.push_response(409, r#"{"current_version": 5}"#);
    push_remote(&transport, 5, json!({"name": "north field", "acres": 3, "crop": "corn"}));
    let (_network, rx) = watch::channel(wifi());
    let coordinator =
        CoordinatorBuilder::new(test_config(), transport.clone(), seeded(), rx).build().unwrap();
    let local = json!({"name": "north", "acres": 5, "crop": "corn"});
    let id = coordinator.enqueue(update("p-1", "k1", local)).unwrap();

    let cycle = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run_cycle().await })
    };
    // Write rejected with 409.
    gate.entered.notified().await;
    gate.release.notify_one();
    // Remote fetch in progress.
    gate.entered.notified().await;
    assert_eq!(coordinator.state_of(id), Some(OperationState::ConflictPending));
    assert!(coordinator.cancel(id));
    gate.release.notify_one();
    // Merged resubmission.
    gate.entered.notified().await;
    gate.release.notify_one();

    let report = cycle.await.unwrap();
    assert_eq!((report.cancelled, report.succeeded), (1, 0));
    assert_eq!(coordinator.state_of(id), Some(OperationState::Cancelled));
    let entity = coordinator.storage().get("p-1").unwrap().unwrap();
    assert_eq!(entity.version, 3);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn urgent_edit_waits_behind_older_edit_on_same_entity() {
    let very_poor = NetworkSample::connected(TransportType::Cellular2G, Some(20), false);
    let h = build(test_config(), seeded(), very_poor);
    let normal = h.coordinator.enqueue(update("p-1", "a", json!({"acres": 4}))).unwrap();
    let blocked = h
        .coordinator
        .enqueue(update("p-1", "b", json!({"acres": 5})).priority(Priority::Urgent))
        .unwrap();
    let free = h
        .coordinator
        .enqueue(update("p-2", "c", json!({"acres": 6})).priority(Priority::Urgent))
        .unwrap();

    assert_eq!(h.coordinator.status().strategy, SyncStrategy::Minimal);
    assert_eq!(h.coordinator.run_cycle().await.dispatched, 1);
    assert_eq!(h.coordinator.state_of(free), Some(OperationState::Succeeded));
    assert_eq!(h.coordinator.run_cycle().await.dispatched, 0);
    assert_eq!(h.coordinator.state_of(blocked), Some(OperationState::Queued));

    h.network.send(wifi()).unwrap();
    h.coordinator.run_cycle().await;
    h.coordinator.run_cycle().await;
    assert_eq!(h.coordinator.state_of(normal), Some(OperationState::Succeeded));
    assert_eq!(h.coordinator.state_of(blocked), Some(OperationState::Succeeded));
    let keys: Vec<_> =
        h.transport.requests().iter().map(|r| r.idempotency_key.clone()).collect();
    assert_eq!(keys, vec!["c", "a", "b"]);
    assert_eq!(h.transport.requests()[2].expected_version, 4);
}

#[tokio::test]
async fn priority_admission_follows_strategy() {
    let poor = NetworkSample::connected(TransportType::Cellular4G, Some(300), false);
    let h = harness(poor);
    h.coordinator.enqueue(update("p-1", "k1", json!({})).priority(Priority::Normal)).unwrap();
    let high = h.coordinator.enqueue(update("p-2", "k2", json!({})).priority(Priority::High)).unwrap();

    assert_eq!(h.coordinator.status().strategy, SyncStrategy::CriticalOnly);
    let report = h.coordinator.run_cycle().await;
    assert_eq!(report.dispatched, 1);
    assert_eq!(h.coordinator.state_of(high), Some(OperationState::Succeeded));
    assert_eq!(h.coordinator.status().counts.queued, 1);
    assert_eq!(h.coordinator.status().pending, 1);
}

#[tokio::test]
async fn metered_link_is_downgraded() {
    let h = harness(NetworkSample::connected(TransportType::Cellular4G, Some(3_000), true));
    let status = h.coordinator.status();
    assert_eq!(status.tier, QualityTier::Good);
    assert_eq!(status.strategy, SyncStrategy::Conservative);
    assert!(status.connected);
}

#[tokio::test]
async fn progress_events_follow_operation() {
    let h = harness(wifi());
    let mut events = h.coordinator.subscribe_progress();
    let id = h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();
    h.coordinator.run_cycle().await;

    let mut percents = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.operation_id, id);
        percents.push(event.percent);
    }
    assert_eq!(percents, vec![0, 10, 30, 90, 100]);
}

#[tokio::test]
async fn journal_restores_pending_operations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.jsonl");
    let config = EngineConfig { journal_path: Some(path.clone()), ..test_config() };

    {
        let h = build(config.clone(), MemoryStorage::new(), offline());
        h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();
        h.coordinator.enqueue(update("p-2", "k2", json!({"acres": 5}))).unwrap();
    }

    let h = build(config, MemoryStorage::new(), wifi());
    assert_eq!(h.coordinator.pending().len(), 2);
    let err = h.coordinator.enqueue(update("p-3", "k1", json!({}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operation(SyncOperationError::AlreadyInProgress));

    assert_eq!(h.coordinator.run_cycle().await.succeeded, 2);
    assert!(Journal::open(&path).unwrap().load().unwrap().is_empty());
}

#[tokio::test]
async fn run_loop_syncs_until_shutdown() {
    let h = harness(wifi());
    let mut events = h.coordinator.subscribe_progress();
    let shutdown = CancellationToken::new();
    let runner = {
        let coordinator = h.coordinator.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { coordinator.run(token).await })
    };

    let id = h.coordinator.enqueue(update("p-1", "k1", json!({"acres": 4}))).unwrap();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
        if event.operation_id == id && event.state == OperationState::Succeeded {
            break;
        }
    }

    shutdown.cancel();
    runner.await.unwrap();
    assert_eq!(h.transport.request_count(), 1);
}
