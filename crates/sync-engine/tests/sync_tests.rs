// crates/sync-engine/tests/sync_tests.rs
//! Integration tests for the sync engine

use async_trait::async_trait;
use futures::future::join_all;
use laboursync_core::{
    EventStatus, EventType, OutboxEvent, RemoteError, RemoteResponse, RemoteService,
};
use laboursync_database::{open, open_in_memory, queries, DatabaseConfig, DbPool};
use laboursync_network::{Client, ConnectivityChecker, NetworkDetector, NetworkState};
use laboursync_resilience::RetryPolicy;
use laboursync_sync_engine::{
    BlockReason, GuestModeManager, OutboxManager, QueueReason, SettledEvent, SkipReason,
    SubmitOutcome, SyncConfig, SyncEngine, SyncError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

const START_TIME: &str = "2023-01-01T10:00:00Z";

/// Remote service that records every call and answers from a script
#[derive(Default)]
struct MockRemote {
    calls: Mutex<Vec<(EventType, Value)>>,
    /// Number of upcoming calls to fail
    failures: Mutex<u32>,
    /// Restricts scripted failures to one event type
    failing_type: Mutex<Option<EventType>>,
    /// Entity ids handed out for created contractions, keyed by start time
    created_ids: Mutex<HashMap<String, String>>,
}

impl MockRemote {
    fn fail_next(&self, count: u32) {
        *self.failures.lock().unwrap() = count;
    }

    fn fail_next_of(&self, event_type: EventType, count: u32) {
        *self.failing_type.lock().unwrap() = Some(event_type);
        self.fail_next(count);
    }

    fn assign_id(&self, start_time: &str, real_id: &str) {
        self.created_ids
            .lock()
            .unwrap()
            .insert(start_time.to_string(), real_id.to_string());
    }

    fn calls(&self) -> Vec<(EventType, Value)> {
        self.calls.lock().unwrap().clone()
    }

    fn call_types(&self) -> Vec<EventType> {
        self.calls().into_iter().map(|(t, _)| t).collect()
    }

    fn respond(&self, event_type: EventType, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.calls.lock().unwrap().push((event_type, payload.clone()));

        let targeted = self
            .failing_type
            .lock()
            .unwrap()
            .is_none_or(|t| t == event_type);
        if targeted {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(RemoteError::Transport("connection reset".to_string()));
            }
        }

        if event_type == EventType::StartContraction {
            let start_time = payload["start_time"].as_str().unwrap_or_default();
            if let Some(id) = self.created_ids.lock().unwrap().get(start_time) {
                return Ok(RemoteResponse::created(id.clone()));
            }
        }
        Ok(RemoteResponse::snapshot(json!({"ok": true})))
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn plan_labour(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.respond(EventType::PlanLabour, payload)
    }
    async fn start_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.respond(EventType::StartContraction, payload)
    }
    async fn end_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.respond(EventType::EndContraction, payload)
    }
    async fn update_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.respond(EventType::UpdateContraction, payload)
    }
    async fn delete_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.respond(EventType::DeleteContraction, payload)
    }
    async fn post_labour_update(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.respond(EventType::PostLabourUpdate, payload)
    }
    async fn complete_labour(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.respond(EventType::CompleteLabour, payload)
    }
}

/// Remote service that accepts everything but drops the identifier map while
/// a contraction start is in flight
struct StoreBreakingRemote {
    pool: DbPool,
}

#[async_trait]
impl RemoteService for StoreBreakingRemote {
    async fn plan_labour(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::default())
    }
    async fn start_contraction(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
        sqlx::query("DROP TABLE identifier_map")
            .execute(&self.pool)
            .await
            .unwrap();
        Ok(RemoteResponse::created("real-abc"))
    }
    async fn end_contraction(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::default())
    }
    async fn update_contraction(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::default())
    }
    async fn delete_contraction(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::default())
    }
    async fn post_labour_update(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::default())
    }
    async fn complete_labour(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::default())
    }
}

struct Harness {
    pool: DbPool,
    remote: Arc<MockRemote>,
    detector: NetworkDetector,
    engine: SyncEngine,
}

async fn harness_with(config: SyncConfig, state: NetworkState) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let pool = open_in_memory().await.unwrap();
    let remote = Arc::new(MockRemote::default());
    let checker = ConnectivityChecker::with_urls(Client::new().unwrap(), Vec::new());
    let detector = NetworkDetector::with_state(checker, state);
    let engine = SyncEngine::new(pool.clone(), remote.clone(), detector.clone(), config);

    Harness {
        pool,
        remote,
        detector,
        engine,
    }
}

async fn harness() -> Harness {
    harness_with(SyncConfig::immediate(), NetworkState::online()).await
}

async fn next_settled(rx: &mut broadcast::Receiver<SettledEvent>) -> SettledEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a settled event")
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_get_distinct_sequences() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("outbox.db");
    let pool = open(DatabaseConfig::new(&path)).await.unwrap();
    let outbox = OutboxManager::new(pool);

    let appends = (0..20).map(|i| {
        let outbox = outbox.clone();
        tokio::spawn(async move {
            outbox
                .add_event("labour-a", EventType::PostLabourUpdate, json!({"n": i}), false)
                .await
                .unwrap()
                .sequence
        })
    });

    let mut sequences: Vec<i64> = join_all(appends)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    sequences.sort_unstable();

    assert_eq!(sequences, (1..=20).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_pending_events_in_sequence_order() {
    let h = harness().await;
    let outbox = h.engine.outbox();
    for i in 0..5 {
        outbox
            .add_event("labour-a", EventType::PostLabourUpdate, json!({"n": i}), false)
            .await
            .unwrap();
    }

    let pending = outbox.get_pending_events("labour-a").await.unwrap();
    let sequences: Vec<i64> = pending.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_retriable_events_respect_threshold() {
    let h = harness().await;
    let outbox = h.engine.outbox();

    let mut events = Vec::new();
    for failures in [2u32, 4, 5, 7] {
        let event = outbox
            .add_event("labour-a", EventType::PlanLabour, json!({}), false)
            .await
            .unwrap();
        for _ in 0..failures {
            outbox.mark_event_failed(event.id, "boom").await.unwrap();
        }
        events.push(event);
    }

    let retriable = outbox.get_retriable_events(5).await.unwrap();
    let counts: Vec<u32> = retriable.iter().map(|e| e.retry_count).collect();
    assert_eq!(counts, vec![2, 4]);
}

#[tokio::test]
async fn test_offline_queue_drains_in_order() {
    let h = harness().await;
    let outbox = h.engine.outbox();

    outbox
        .add_event(
            "labour-a",
            EventType::StartContraction,
            json!({"start_time": START_TIME}),
            false,
        )
        .await
        .unwrap();
    outbox
        .add_event(
            "labour-a",
            EventType::EndContraction,
            json!({"end_time": "2023-01-01T10:01:00Z"}),
            false,
        )
        .await
        .unwrap();

    let reports = h.engine.start().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_complete());
    assert_eq!(
        h.remote.calls(),
        vec![
            (EventType::StartContraction, json!({"start_time": START_TIME})),
            (
                EventType::EndContraction,
                json!({"end_time": "2023-01-01T10:01:00Z"})
            ),
        ]
    );
    assert!(outbox.get_pending_events("labour-a").await.unwrap().is_empty());
    assert!(outbox.get_stats().await.unwrap().is_drained());
}

#[tokio::test]
async fn test_temp_id_replaced_after_creation_syncs() {
    let h = harness().await;
    h.remote.assign_id(START_TIME, "real-abc");

    h.engine
        .reconciler()
        .add_temp_mapping("labour-a", "optimistic-123", START_TIME)
        .await
        .unwrap();
    let outbox = h.engine.outbox();
    outbox
        .add_event(
            "labour-a",
            EventType::StartContraction,
            json!({"start_time": START_TIME}),
            false,
        )
        .await
        .unwrap();
    outbox
        .add_event(
            "labour-a",
            EventType::UpdateContraction,
            json!({"contraction_id": "optimistic-123", "intensity": 7}),
            false,
        )
        .await
        .unwrap();

    h.engine.start().await.unwrap();

    let calls = h.remote.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].0, EventType::UpdateContraction);
    assert_eq!(calls[1].1["contraction_id"], "real-abc");
    assert_eq!(calls[1].1["intensity"], 7);
}

#[tokio::test]
async fn test_unresolved_reference_parks_event() {
    let h = harness().await;
    h.engine
        .reconciler()
        .add_temp_mapping("labour-a", "optimistic-9", START_TIME)
        .await
        .unwrap();
    let event = h
        .engine
        .outbox()
        .add_event(
            "labour-a",
            EventType::EndContraction,
            json!({"contraction_id": "optimistic-9"}),
            false,
        )
        .await
        .unwrap();

    let reports = h.engine.start().await.unwrap();

    assert!(h.remote.calls().is_empty());
    let failed = reports[0].failed.as_ref().unwrap();
    assert!(matches!(
        failed.error,
        SyncError::UnresolvedIdentifier { ref temp_id, .. } if temp_id == "optimistic-9"
    ));

    let stored = h.engine.outbox().get_event(event.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EventStatus::Failed);
    assert_eq!(stored.retry_count, 1);

    let status = h.engine.get_sync_status().await.unwrap();
    assert_eq!(status.scheduled_retries, 1);
    h.engine.stop();
}

#[tokio::test]
async fn test_failure_blocks_later_events() {
    let h = harness().await;
    h.remote.fail_next(1);
    let outbox = h.engine.outbox();

    let first = outbox
        .add_event("labour-a", EventType::PlanLabour, json!({"step": 1}), false)
        .await
        .unwrap();
    let second = outbox
        .add_event("labour-a", EventType::PostLabourUpdate, json!({"step": 2}), false)
        .await
        .unwrap();

    let reports = h.engine.start().await.unwrap();
    assert_eq!(reports[0].blocked, Some(BlockReason::Failed));
    assert_eq!(h.remote.call_types(), vec![EventType::PlanLabour]);

    let first_stored = outbox.get_event(first.id).await.unwrap().unwrap();
    assert_eq!(first_stored.status, EventStatus::Failed);
    assert_eq!(first_stored.retry_count, 1);
    assert_eq!(
        outbox.get_event(second.id).await.unwrap().unwrap().status,
        EventStatus::Pending
    );

    // Another drain still refuses to skip ahead.
    h.engine.trigger_sync().await.unwrap();
    assert_eq!(h.remote.calls().len(), 1);

    assert_eq!(h.engine.retry_failed_events().await.unwrap(), 1);
    assert_eq!(
        h.remote.call_types(),
        vec![
            EventType::PlanLabour,
            EventType::PlanLabour,
            EventType::PostLabourUpdate
        ]
    );
    assert!(outbox.get_stats().await.unwrap().is_drained());
    assert_eq!(h.engine.get_sync_status().await.unwrap().scheduled_retries, 0);
}

#[tokio::test]
async fn test_automatic_retry_after_backoff() {
    let config = SyncConfig::immediate()
        .with_retry_policy(RetryPolicy::new().with_initial_delay(Duration::from_millis(10)));
    let h = harness_with(config, NetworkState::online()).await;
    h.remote.fail_next(1);
    let mut settled = h.engine.subscribe_settled();

    let event = h
        .engine
        .outbox()
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    h.engine.start().await.unwrap();

    let failed = next_settled(&mut settled).await;
    assert_eq!(failed.event_id, event.id);
    assert!(!failed.is_synced());

    let synced = next_settled(&mut settled).await;
    assert_eq!(synced.event_id, event.id);
    assert!(synced.is_synced());
    assert_eq!(h.remote.calls().len(), 2);
    assert!(h.engine.outbox().get_event(event.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_retry_ceiling_stops_automatic_retries() {
    let config = SyncConfig::immediate().with_retry_policy(
        RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_retries(Some(1)),
    );
    let h = harness_with(config, NetworkState::online()).await;
    h.remote.fail_next(1);

    h.engine
        .outbox()
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    h.engine.start().await.unwrap();

    let status = h.engine.get_sync_status().await.unwrap();
    assert_eq!(status.scheduled_retries, 0);
    assert_eq!(status.stats.failed, 1);
}

#[tokio::test]
async fn test_stop_cancels_retries_without_resetting_status() {
    let h = harness().await;
    h.remote.fail_next(1);

    let event = h
        .engine
        .outbox()
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    h.engine.start().await.unwrap();
    assert_eq!(h.engine.get_sync_status().await.unwrap().scheduled_retries, 1);

    h.engine.stop();

    let status = h.engine.get_sync_status().await.unwrap();
    assert!(!status.is_running);
    assert_eq!(status.scheduled_retries, 0);
    assert_eq!(
        h.engine.outbox().get_event(event.id).await.unwrap().unwrap().status,
        EventStatus::Failed
    );
}

fn slow_retry_config() -> SyncConfig {
    SyncConfig::immediate()
        .with_retry_policy(RetryPolicy::new().with_initial_delay(Duration::from_millis(50)))
}

#[tokio::test]
async fn test_restart_resends_failed_event() {
    let h = harness_with(slow_retry_config(), NetworkState::online()).await;
    h.remote.fail_next(1);
    let outbox = h.engine.outbox();

    let first = outbox
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    let second = outbox
        .add_event("labour-a", EventType::PostLabourUpdate, json!({}), false)
        .await
        .unwrap();

    h.engine.start().await.unwrap();
    h.engine.stop();
    assert_eq!(h.engine.get_sync_status().await.unwrap().scheduled_retries, 0);

    let mut settled = h.engine.subscribe_settled();
    h.engine.start().await.unwrap();
    assert_eq!(h.engine.get_sync_status().await.unwrap().scheduled_retries, 1);

    let resent = next_settled(&mut settled).await;
    assert_eq!(resent.event_id, first.id);
    assert!(resent.is_synced());
    let follower = next_settled(&mut settled).await;
    assert_eq!(follower.event_id, second.id);
    assert!(follower.is_synced());

    assert_eq!(
        h.remote.call_types(),
        vec![
            EventType::PlanLabour,
            EventType::PlanLabour,
            EventType::PostLabourUpdate
        ]
    );
    assert!(outbox.get_stats().await.unwrap().is_drained());
    h.engine.stop();
}

#[tokio::test]
async fn test_new_engine_resends_failed_event_from_store() {
    let h = harness_with(slow_retry_config(), NetworkState::online()).await;
    h.remote.fail_next(1);
    let event = h
        .engine
        .outbox()
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    h.engine.start().await.unwrap();
    h.engine.stop();
    drop(h.engine);

    let engine = SyncEngine::new(
        h.pool.clone(),
        h.remote.clone(),
        h.detector.clone(),
        slow_retry_config(),
    );
    let mut settled = engine.subscribe_settled();
    engine.start().await.unwrap();

    let resent = next_settled(&mut settled).await;
    assert_eq!(resent.event_id, event.id);
    assert!(resent.is_synced());
    assert_eq!(h.remote.calls().len(), 2);
    engine.stop();
}

#[tokio::test]
async fn test_store_failure_after_send_returns_event_to_pending() {
    let _ = env_logger::builder().is_test(true).try_init();
    let pool = open_in_memory().await.unwrap();
    let checker = ConnectivityChecker::with_urls(Client::new().unwrap(), Vec::new());
    let engine = SyncEngine::new(
        pool.clone(),
        Arc::new(StoreBreakingRemote { pool: pool.clone() }),
        NetworkDetector::with_state(checker, NetworkState::online()),
        SyncConfig::immediate(),
    );
    engine.start().await.unwrap();

    let event = engine
        .outbox()
        .add_event(
            "labour-a",
            EventType::StartContraction,
            json!({"start_time": START_TIME}),
            false,
        )
        .await
        .unwrap();

    let result = engine.sync_aggregate("labour-a").await;
    assert!(matches!(result, Err(SyncError::Storage(_))));

    let stored = engine.outbox().get_event(event.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EventStatus::Pending);
    assert_eq!(stored.retry_count, 0);
    assert_eq!(engine.get_sync_status().await.unwrap().active_syncs, 0);
    engine.stop();
}

#[tokio::test]
async fn test_unknown_event_type_fails_without_remote_call() {
    let h = harness().await;
    let mut event = OutboxEvent::new("labour-a", EventType::PlanLabour, 1, json!({}), false);
    event.event_type = "rename_labour".to_string();
    queries::outbox::insert_event(&h.pool, &event).await.unwrap();

    let reports = h.engine.start().await.unwrap();

    assert!(h.remote.calls().is_empty());
    assert!(matches!(
        reports[0].failed.as_ref().map(|f| &f.error),
        Some(SyncError::UnknownEventType(name)) if name == "rename_labour"
    ));
    let status = h.engine.get_sync_status().await.unwrap();
    assert_eq!(status.stats.failed, 1);
    assert_eq!(status.scheduled_retries, 0);
}

#[tokio::test]
async fn test_guest_events_stay_local_until_upgrade() {
    let h = harness().await;
    let guests = GuestModeManager::new(h.pool.clone());
    let profile = guests.get_or_create_profile().await.unwrap();

    let planned = guests
        .record_event(&profile.guest_id, EventType::PlanLabour, json!({"due": "2023-02-01"}))
        .await
        .unwrap();
    guests
        .record_event(
            &profile.guest_id,
            EventType::StartContraction,
            json!({"start_time": START_TIME}),
        )
        .await
        .unwrap();

    h.engine.start().await.unwrap();
    assert!(h.remote.calls().is_empty());

    let report = h
        .engine
        .sync_aggregate(&profile.aggregate_id())
        .await
        .unwrap();
    assert_eq!(report.blocked, Some(BlockReason::GuestEvent));
    assert!(h.remote.calls().is_empty());

    assert_eq!(
        guests
            .upgrade_to_authenticated_mode(&profile.guest_id)
            .await
            .unwrap(),
        2
    );

    let upgraded = h.engine.outbox().get_event(planned.id).await.unwrap().unwrap();
    assert!(!upgraded.is_guest_event);
    assert_eq!(upgraded.sequence, planned.sequence);
    assert_eq!(upgraded.payload, planned.payload);

    let stored = guests.get_profile(&profile.guest_id).await.unwrap().unwrap();
    assert!(stored.is_upgraded);

    h.engine.trigger_sync().await.unwrap();
    assert_eq!(
        h.remote.call_types(),
        vec![EventType::PlanLabour, EventType::StartContraction]
    );
}

#[tokio::test]
async fn test_prune_keeps_synced_guest_events() {
    let h = harness().await;
    let outbox = h.engine.outbox();

    let guest = outbox
        .add_event("guest-labour-g1", EventType::PlanLabour, json!({}), true)
        .await
        .unwrap();
    outbox.mark_event_synced(guest.id).await.unwrap();

    let normal = outbox
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    queries::outbox::set_status(&h.pool, normal.id, EventStatus::Synced)
        .await
        .unwrap();

    assert_eq!(outbox.prune_synced_events().await.unwrap(), 1);
    assert_eq!(
        outbox.get_event(guest.id).await.unwrap().unwrap().status,
        EventStatus::Synced
    );
    assert!(outbox.get_event(normal.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reconnect_drains_after_debounce() {
    let h = harness_with(SyncConfig::immediate(), NetworkState::offline()).await;
    let mut settled = h.engine.subscribe_settled();

    h.engine.start().await.unwrap();
    let event = h
        .engine
        .enqueue("labour-a", EventType::PlanLabour, json!({}))
        .await
        .unwrap();
    assert!(h.remote.calls().is_empty());

    h.detector.set_online(true);

    let synced = next_settled(&mut settled).await;
    assert_eq!(synced.event_id, event.id);
    assert!(synced.is_synced());
    assert_eq!(h.remote.call_types(), vec![EventType::PlanLabour]);
}

#[tokio::test]
async fn test_slow_link_is_not_syncable() {
    let slow = NetworkState {
        effective_type: Some(laboursync_network::EffectiveType::Slow2g),
        ..NetworkState::online()
    };
    let h = harness_with(SyncConfig::immediate(), slow).await;
    h.engine.start().await.unwrap();

    h.engine
        .outbox()
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    let report = h.engine.sync_aggregate("labour-a").await.unwrap();

    assert_eq!(report.skipped, Some(SkipReason::NotSyncable));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_submit_reports_immediate_outcome() {
    let h = harness().await;
    h.remote.assign_id(START_TIME, "real-1");
    h.engine.start().await.unwrap();

    let outcome = h
        .engine
        .submit(
            "labour-a",
            EventType::StartContraction,
            json!({"start_time": START_TIME}),
        )
        .await
        .unwrap();

    match outcome {
        SubmitOutcome::Synced { event, response } => {
            assert_eq!(event.sequence, 1);
            assert_eq!(response, RemoteResponse::created("real-1"));
        }
        other => panic!("expected synced outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_surfaces_remote_failure() {
    let h = harness().await;
    h.engine.start().await.unwrap();
    h.remote.fail_next(1);

    let result = h
        .engine
        .submit("labour-a", EventType::PlanLabour, json!({}))
        .await;

    assert!(matches!(result, Err(SyncError::Remote(RemoteError::Transport(_)))));
    assert_eq!(h.engine.get_sync_status().await.unwrap().stats.failed, 1);
    h.engine.stop();
}

#[tokio::test]
async fn test_submit_while_offline_is_queued() {
    let h = harness_with(SyncConfig::immediate(), NetworkState::offline()).await;
    h.engine.start().await.unwrap();

    let outcome = h
        .engine
        .submit("labour-a", EventType::PlanLabour, json!({}))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SubmitOutcome::Queued {
            reason: QueueReason::Offline,
            ..
        }
    ));
    assert!(h.remote.calls().is_empty());
    assert_eq!(outcome.event().status, EventStatus::Pending);
}

#[tokio::test]
async fn test_start_recovers_interrupted_events() {
    let h = harness().await;
    let outbox = h.engine.outbox();
    let event = outbox
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    outbox.mark_event_syncing(event.id).await.unwrap();

    h.engine.start().await.unwrap();

    assert_eq!(h.remote.call_types(), vec![EventType::PlanLabour]);
    assert!(outbox.get_event(event.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_aggregates_drain_independently() {
    let h = harness().await;
    h.remote.fail_next_of(EventType::PlanLabour, 1);
    let outbox = h.engine.outbox();

    outbox
        .add_event("labour-a", EventType::PlanLabour, json!({}), false)
        .await
        .unwrap();
    for _ in 0..2 {
        outbox
            .add_event("labour-b", EventType::PostLabourUpdate, json!({}), false)
            .await
            .unwrap();
    }

    let reports = h.engine.start().await.unwrap();
    let by_aggregate: HashMap<&str, _> = reports
        .iter()
        .map(|r| (r.aggregate_id.as_str(), r))
        .collect();

    assert!(by_aggregate["labour-a"].failed.is_some());
    assert_eq!(by_aggregate["labour-b"].synced.len(), 2);
    h.engine.stop();
}
