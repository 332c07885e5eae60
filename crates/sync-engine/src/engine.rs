// crates/sync-engine/src/engine.rs
//! Main sync engine
//!
//! Drains the outbox against the remote service. Each aggregate is drained by at
//! most one task at a time, strictly in sequence order, and a drain never moves
//! past an event that failed: the event is retried with exponential backoff and
//! everything queued behind it waits.
//!
//! Aggregates are independent; [`SyncEngine::trigger_sync`] drains all of them
//! concurrently.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::id_map::IdentifierReconciler;
use crate::outbox::OutboxManager;
use crate::types::{
    BlockReason, DrainReport, FailedAttempt, QueueReason, SettleOutcome, SettledEvent,
    SkipReason, SubmitOutcome, SyncStatus,
};
use futures::future::join_all;
use laboursync_core::{
    EventId, EventStatus, EventType, OutboxEvent, RemoteResponse, RemoteService,
};
use laboursync_database::DbPool;
use laboursync_network::{NetworkDetector, NetworkState, Subscription};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Retry timers are keyed by aggregate and sequence
type RetryKey = (String, i64);

/// Entry of the active set
struct DrainSlot {
    token: u64,
    /// Another caller asked for this aggregate while it was being drained
    rerun: bool,
}

struct Inner {
    config: SyncConfig,
    outbox: OutboxManager,
    reconciler: IdentifierReconciler,
    remote: Arc<dyn RemoteService>,
    detector: NetworkDetector,
    running: AtomicBool,
    was_syncable: AtomicBool,
    next_token: AtomicU64,
    /// Aggregate being drained -> the drain holding it
    active: Mutex<HashMap<String, DrainSlot>>,
    retry_timers: Mutex<HashMap<RetryKey, (u64, JoinHandle<()>)>>,
    subscription: Mutex<Option<Subscription>>,
    debounce: Mutex<Option<JoinHandle<()>>>,
    settled: broadcast::Sender<SettledEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, (_, handle)) in lock(&self.retry_timers).drain() {
            handle.abort();
        }
        if let Some(handle) = lock(&self.debounce).take() {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Marks an aggregate as being drained for as long as it lives
struct DrainGuard {
    inner: Arc<Inner>,
    aggregate_id: String,
    token: u64,
}

impl DrainGuard {
    /// Claims the aggregate, or asks its current holder for another pass
    fn acquire(inner: &Arc<Inner>, aggregate_id: &str) -> Option<Self> {
        let mut active = lock(&inner.active);
        if let Some(slot) = active.get_mut(aggregate_id) {
            slot.rerun = true;
            return None;
        }

        let token = inner.next_token.fetch_add(1, Ordering::Relaxed);
        active.insert(aggregate_id.to_string(), DrainSlot { token, rerun: false });

        Some(Self {
            inner: Arc::clone(inner),
            aggregate_id: aggregate_id.to_string(),
            token,
        })
    }

    /// Releases the aggregate unless a pass was requested meanwhile
    ///
    /// Returns true if the caller must drain again. Checking and releasing
    /// happen under one lock, so a request is either seen here or finds the
    /// aggregate free.
    fn release_or_rerun(&self) -> bool {
        let mut active = lock(&self.inner.active);
        match active.get_mut(&self.aggregate_id) {
            Some(slot) if slot.token == self.token => {
                if std::mem::take(&mut slot.rerun) {
                    return true;
                }
                active.remove(&self.aggregate_id);
                false
            }
            _ => false,
        }
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let mut active = lock(&self.inner.active);
        // stop() may have cleared the set and a newer drain may own the entry.
        if active
            .get(&self.aggregate_id)
            .is_some_and(|slot| slot.token == self.token)
        {
            active.remove(&self.aggregate_id);
        }
    }
}

/// Offline-first synchronization engine
///
/// Cloning is cheap; all clones drive the same engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    /// Creates a stopped engine
    pub fn new(
        pool: DbPool,
        remote: Arc<dyn RemoteService>,
        detector: NetworkDetector,
        config: SyncConfig,
    ) -> Self {
        let (settled, _) = broadcast::channel(config.settled_capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                outbox: OutboxManager::new(pool.clone()),
                reconciler: IdentifierReconciler::new(pool),
                remote,
                detector,
                running: AtomicBool::new(false),
                was_syncable: AtomicBool::new(false),
                next_token: AtomicU64::new(1),
                active: Mutex::new(HashMap::new()),
                retry_timers: Mutex::new(HashMap::new()),
                subscription: Mutex::new(None),
                debounce: Mutex::new(None),
                settled,
                config,
            }),
        }
    }

    pub fn outbox(&self) -> &OutboxManager {
        &self.inner.outbox
    }

    pub fn reconciler(&self) -> &IdentifierReconciler {
        &self.inner.reconciler
    }

    pub fn detector(&self) -> &NetworkDetector {
        &self.inner.detector
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Receives a notification after every attempt to send an event
    pub fn subscribe_settled(&self) -> broadcast::Receiver<SettledEvent> {
        self.inner.settled.subscribe()
    }

    /// Starts the engine
    ///
    /// Returns events left in `syncing` by an interrupted run to `pending`,
    /// puts every `failed` event back on the backoff schedule, starts
    /// listening to the network detector and, if the network allows it, drains
    /// every aggregate before returning. Starting a running engine does
    /// nothing.
    pub async fn start(&self) -> SyncResult<Vec<DrainReport>> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Sync engine already running");
            return Ok(Vec::new());
        }

        if let Err(e) = self.restore_pending_work().await {
            self.inner.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let engine = Arc::downgrade(&self.inner);
        let subscription = self.inner.detector.subscribe(move |state| {
            if let Some(inner) = engine.upgrade() {
                SyncEngine { inner }.on_network_change(state);
            }
        });
        *lock(&self.inner.subscription) = Some(subscription);

        let syncable = self.inner.detector.is_syncable();
        self.inner.was_syncable.store(syncable, Ordering::SeqCst);
        log::info!("Sync engine started (syncable: {})", syncable);

        self.trigger_sync().await
    }

    /// Stops the engine
    ///
    /// Cancels every retry timer without touching event status and stops
    /// listening to the network. A remote call already in flight still
    /// completes and its result is stored, but nothing runs after it.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        lock(&self.inner.active).clear();

        let timers: Vec<JoinHandle<()>> = lock(&self.inner.retry_timers)
            .drain()
            .map(|(_, (_, handle))| handle)
            .collect();
        let cancelled = timers.len();
        for handle in timers {
            handle.abort();
        }

        if let Some(handle) = lock(&self.inner.debounce).take() {
            handle.abort();
        }

        let subscription = lock(&self.inner.subscription).take();
        drop(subscription);

        log::info!("Sync engine stopped ({} retries cancelled)", cancelled);
    }

    /// Drains every aggregate with pending non-guest events and waits for all
    ///
    /// Does nothing while stopped or when the network is not syncable.
    pub async fn trigger_sync(&self) -> SyncResult<Vec<DrainReport>> {
        if !self.is_running() {
            log::trace!("Sync requested while stopped");
            return Ok(Vec::new());
        }
        if !self.inner.detector.is_syncable() {
            log::debug!("Network not syncable; skipping sync");
            return Ok(Vec::new());
        }

        let aggregates = self.inner.outbox.get_pending_aggregates().await?;
        if aggregates.is_empty() {
            return Ok(Vec::new());
        }

        log::debug!("Draining {} aggregates", aggregates.len());
        join_all(aggregates.iter().map(|id| self.sync_aggregate(id)))
            .await
            .into_iter()
            .collect()
    }

    /// Sends the queued events of one aggregate in sequence order
    ///
    /// Stops at the first failure, at an event that is already failed or in
    /// flight, and at a guest event. Events appended while the drain runs are
    /// picked up before it returns. Remote failures end up in the report; only
    /// storage failures are returned as errors.
    pub async fn sync_aggregate(&self, aggregate_id: &str) -> SyncResult<DrainReport> {
        if !self.is_running() {
            return Ok(DrainReport::skipped(aggregate_id, SkipReason::NotRunning));
        }
        if !self.inner.detector.is_syncable() {
            return Ok(DrainReport::skipped(aggregate_id, SkipReason::NotSyncable));
        }
        let Some(guard) = DrainGuard::acquire(&self.inner, aggregate_id) else {
            log::trace!("Drain of {} already in progress", aggregate_id);
            return Ok(DrainReport::skipped(aggregate_id, SkipReason::AlreadyDraining));
        };

        let mut report = DrainReport::new(aggregate_id);

        loop {
            let blocked = self.drain_pass(aggregate_id, &mut report).await?;

            // The pass may have read a row before a concurrent retry reset it;
            // a pass requested meanwhile reads again.
            let may_be_stale = report.failed.is_none()
                && matches!(
                    blocked,
                    None | Some(BlockReason::Failed) | Some(BlockReason::InFlight)
                );
            if may_be_stale && guard.release_or_rerun() {
                log::trace!("Draining {} again on request", aggregate_id);
                continue;
            }

            if !report.synced.is_empty() {
                log::info!("Synced {} events of {}", report.synced.len(), aggregate_id);
            }
            return Ok(match blocked {
                Some(reason) => report.blocked(reason),
                None => report,
            });
        }
    }

    /// Sends unsettled events until the queue is empty or something blocks it
    async fn drain_pass(
        &self,
        aggregate_id: &str,
        report: &mut DrainReport,
    ) -> SyncResult<Option<BlockReason>> {
        loop {
            let events = self.inner.outbox.get_unsettled_events(aggregate_id).await?;
            if events.is_empty() {
                return Ok(None);
            }

            for event in events {
                if !self.is_running() {
                    return Ok(Some(BlockReason::Stopped));
                }
                if !self.inner.detector.is_syncable() {
                    return Ok(Some(BlockReason::Offline));
                }
                match event.status {
                    EventStatus::Failed => return Ok(Some(BlockReason::Failed)),
                    EventStatus::Syncing => return Ok(Some(BlockReason::InFlight)),
                    EventStatus::Pending | EventStatus::Synced => {}
                }
                if event.is_guest_event {
                    return Ok(Some(BlockReason::GuestEvent));
                }

                match self.sync_event(&event).await {
                    Ok(response) => {
                        report.synced.push((event.id, response));
                        if !self.inner.config.inter_event_delay.is_zero() {
                            tokio::time::sleep(self.inner.config.inter_event_delay).await;
                        }
                    }
                    Err(error) if error.is_storage() => return Err(error),
                    Err(error) => {
                        report.failed = Some(FailedAttempt {
                            event_id: event.id,
                            sequence: event.sequence,
                            error,
                        });
                        return Ok(Some(BlockReason::Failed));
                    }
                }
            }
        }
    }

    /// Sends a single event
    ///
    /// Marks it `syncing`, rewrites temporary ids it references, dispatches it
    /// and completes it. On failure the event is marked `failed` and, unless the
    /// failure is permanent, put on the backoff schedule.
    ///
    /// If the store fails once the event is `syncing`, the event is returned
    /// to `pending` before the error is surfaced. When that happens after the
    /// remote accepted it, the next drain sends it again.
    pub async fn sync_event(&self, event: &OutboxEvent) -> SyncResult<RemoteResponse> {
        let Some(kind) = event.kind() else {
            log::error!(
                "Event {} has unknown type '{}'; not sending",
                event.id,
                event.event_type
            );
            let error = SyncError::UnknownEventType(event.event_type.clone());
            self.inner
                .outbox
                .mark_event_failed(event.id, &error.to_string())
                .await?;
            self.emit_failure(event, &error);
            return Err(error);
        };

        self.inner.outbox.mark_event_syncing(event.id).await?;

        let payload = match self.translate_payload(event, kind).await {
            Ok(payload) => payload,
            Err(error) if error.is_storage() => return self.release_event(event, error).await,
            Err(error) => return self.fail_event(event, error).await,
        };

        match self.inner.remote.dispatch(kind, &payload).await {
            Ok(response) => {
                let completed = match self
                    .reconcile_created_id(event, kind, &payload, &response)
                    .await
                {
                    Ok(()) => self.inner.outbox.mark_event_synced(event.id).await,
                    Err(error) => Err(error),
                };
                if let Err(error) = completed {
                    return self.release_event(event, error).await;
                }
                log::debug!(
                    "Synced {} #{} of {}",
                    event.event_type,
                    event.sequence,
                    event.aggregate_id
                );

                self.emit(SettledEvent {
                    event_id: event.id,
                    aggregate_id: event.aggregate_id.clone(),
                    sequence: event.sequence,
                    event_type: event.event_type.clone(),
                    outcome: SettleOutcome::Synced {
                        response: response.clone(),
                    },
                });
                Ok(response)
            }
            Err(error) => self.fail_event(event, SyncError::Remote(error)).await,
        }
    }

    /// Puts a failed event on the backoff schedule
    ///
    /// `event` is the event as it was before the failing attempt. Replaces any
    /// timer already scheduled for the same aggregate and sequence. Does nothing
    /// while stopped or once the retry ceiling is reached.
    pub fn schedule_retry(&self, event: &OutboxEvent) {
        self.arm_retry(event, event.retry_count.saturating_add(1));
    }

    /// Schedules the retry of an event that has failed `failures` times
    fn arm_retry(&self, event: &OutboxEvent, failures: u32) {
        if !self.is_running() {
            log::debug!("Engine stopped; not scheduling retry of {}", event.id);
            return;
        }

        let policy = &self.inner.config.retry_policy;
        if !policy.allows_retry(failures) {
            log::warn!(
                "Event {} failed {} times; waiting for a manual retry",
                event.id,
                failures
            );
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No async runtime; cannot schedule retry of {}", event.id);
            return;
        };

        let delay = policy.delay_after_failures(failures.saturating_sub(1));
        let key: RetryKey = (event.aggregate_id.clone(), event.sequence);
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let engine = Arc::downgrade(&self.inner);
        let event_id = event.id;
        let task_key = key.clone();

        let mut timers = lock(&self.inner.retry_timers);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(inner) = engine.upgrade() else {
                return;
            };
            {
                let mut timers = lock(&inner.retry_timers);
                if timers.get(&task_key).is_some_and(|(t, _)| *t == token) {
                    timers.remove(&task_key);
                }
            }
            SyncEngine { inner }.fire_retry(&task_key.0, event_id).await;
        });

        if let Some((_, previous)) = timers.insert(key, (token, handle)) {
            previous.abort();
        }
        drop(timers);

        log::debug!(
            "Retrying {} #{} of {} in {:?}",
            event.event_type,
            event.sequence,
            event.aggregate_id,
            delay
        );
    }

    /// Resets every failed event below the retry threshold and drains
    ///
    /// Returns the number of events reset.
    pub async fn retry_failed_events(&self) -> SyncResult<usize> {
        let events = self
            .inner
            .outbox
            .get_retriable_events(self.inner.config.max_retries)
            .await?;

        for event in &events {
            self.cancel_retry(&event.aggregate_id, event.sequence);
            self.inner.outbox.retry_event(event.id).await?;
        }

        if !events.is_empty() {
            log::info!("Reset {} failed events for retry", events.len());
            self.trigger_sync().await?;
        }
        Ok(events.len())
    }

    /// Outbox statistics plus the engine's own state
    pub async fn get_sync_status(&self) -> SyncResult<SyncStatus> {
        let stats = self.inner.outbox.get_stats().await?;
        let state = self.inner.detector.state();

        Ok(SyncStatus {
            stats,
            active_syncs: lock(&self.inner.active).len(),
            scheduled_retries: lock(&self.inner.retry_timers).len(),
            is_running: self.is_running(),
            is_online: state.is_online,
            is_syncable: state.is_syncable(),
        })
    }

    /// Queues an event and lets a background drain send it
    pub async fn enqueue(
        &self,
        aggregate_id: &str,
        event_type: EventType,
        payload: Value,
    ) -> SyncResult<OutboxEvent> {
        let event = self
            .inner
            .outbox
            .add_event(aggregate_id, event_type, payload, false)
            .await?;
        self.spawn_drain(Some(aggregate_id.to_string()));
        Ok(event)
    }

    /// Queues an event and tries to send it right away
    ///
    /// A remote failure of this event is returned as an error (the event stays
    /// queued and is retried in the background). Whatever the outcome, a
    /// background sync of the whole backlog follows.
    pub async fn submit(
        &self,
        aggregate_id: &str,
        event_type: EventType,
        payload: Value,
    ) -> SyncResult<SubmitOutcome> {
        let event = self
            .inner
            .outbox
            .add_event(aggregate_id, event_type, payload, false)
            .await?;

        let outcome = if !self.is_running() {
            Ok(SubmitOutcome::Queued {
                event,
                reason: QueueReason::NotRunning,
            })
        } else if !self.inner.detector.is_syncable() {
            Ok(SubmitOutcome::Queued {
                event,
                reason: QueueReason::Offline,
            })
        } else {
            match self.sync_aggregate(aggregate_id).await {
                Ok(report) => submit_outcome(event, report),
                Err(e) => Err(e),
            }
        };

        self.spawn_drain(None);
        outcome
    }

    /// Cancels the retry timer of one event
    fn cancel_retry(&self, aggregate_id: &str, sequence: i64) {
        let key: RetryKey = (aggregate_id.to_string(), sequence);
        if let Some((_, handle)) = lock(&self.inner.retry_timers).remove(&key) {
            handle.abort();
        }
    }

    /// Rebuilds the engine's transient state from the store
    async fn restore_pending_work(&self) -> SyncResult<()> {
        self.inner.outbox.recover_interrupted_events().await?;

        let failed = self
            .inner
            .outbox
            .get_events_by_status(EventStatus::Failed)
            .await?;
        let mut rescheduled = 0;
        for event in failed.iter().filter(|e| !e.is_guest_event) {
            // Unknown types failed permanently.
            if event.kind().is_none() {
                continue;
            }
            self.arm_retry(event, event.retry_count.max(1));
            rescheduled += 1;
        }
        if rescheduled > 0 {
            log::info!("Rescheduled {} failed events", rescheduled);
        }
        Ok(())
    }

    /// Returns an event stuck in `syncing` to `pending` and surfaces `error`
    async fn release_event(&self, event: &OutboxEvent, error: SyncError) -> SyncResult<RemoteResponse> {
        log::error!(
            "Store failed while syncing {} #{} of {}: {}",
            event.event_type,
            event.sequence,
            event.aggregate_id,
            error
        );
        if let Err(e) = self.inner.outbox.retry_event(event.id).await {
            log::error!("Event {} left in syncing until restart: {}", event.id, e);
        }
        Err(error)
    }

    async fn fire_retry(&self, aggregate_id: &str, event_id: EventId) {
        if !self.is_running() {
            return;
        }

        match self.inner.outbox.get_event(event_id).await {
            Ok(Some(event)) if event.status == EventStatus::Failed => {}
            Ok(_) => {
                log::debug!("Event {} no longer waiting for a retry", event_id);
                return;
            }
            Err(e) => {
                log::error!("Failed to load event {} for retry: {}", event_id, e);
                return;
            }
        }

        if let Err(e) = self.inner.outbox.retry_event(event_id).await {
            log::error!("Failed to reset event {} for retry: {}", event_id, e);
            return;
        }

        // Left pending; the next online transition drains it.
        if !self.inner.detector.is_syncable() {
            log::debug!("Retry of {} deferred until the network returns", event_id);
            return;
        }

        if let Err(e) = self.sync_aggregate(aggregate_id).await {
            log::error!("Retry drain of {} failed: {}", aggregate_id, e);
        }
    }

    async fn fail_event(&self, event: &OutboxEvent, error: SyncError) -> SyncResult<RemoteResponse> {
        log::warn!(
            "Failed to sync {} #{} of {}: {}",
            event.event_type,
            event.sequence,
            event.aggregate_id,
            error
        );

        self.inner
            .outbox
            .mark_event_failed(event.id, &error.to_string())
            .await?;
        self.emit_failure(event, &error);

        if error.is_retryable() {
            self.schedule_retry(event);
        }
        Err(error)
    }

    /// Replaces temporary ids in reference fields with their server ids
    async fn translate_payload(&self, event: &OutboxEvent, kind: EventType) -> SyncResult<Value> {
        let mut payload = event.payload.clone();
        let Some(fields) = payload.as_object_mut() else {
            return Ok(payload);
        };

        for field in kind.reference_fields() {
            let Some(candidate) = fields.get(*field).and_then(Value::as_str) else {
                continue;
            };

            let lookup = self
                .inner
                .reconciler
                .lookup(&event.aggregate_id, candidate)
                .await?;
            let Some(id) = lookup.sendable() else {
                return Err(SyncError::UnresolvedIdentifier {
                    field: (*field).to_string(),
                    temp_id: candidate.to_string(),
                });
            };
            if id != candidate {
                log::trace!("Rewrote {} of event {} to {}", field, event.id, id);
                let id = Value::String(id.to_string());
                fields.insert((*field).to_string(), id);
            }
        }

        Ok(payload)
    }

    /// Resolves temporary ids waiting on the entity this event created
    async fn reconcile_created_id(
        &self,
        event: &OutboxEvent,
        kind: EventType,
        payload: &Value,
        response: &RemoteResponse,
    ) -> SyncResult<()> {
        let (Some(field), Some(real_id)) = (kind.correlation_field(), response.entity_id.as_deref())
        else {
            return Ok(());
        };
        let Some(key) = payload.get(field).and_then(correlation_key) else {
            log::debug!("Event {} has no {}; nothing to reconcile", event.id, field);
            return Ok(());
        };

        self.inner
            .reconciler
            .resolve_by_correlation(&event.aggregate_id, &key, real_id)
            .await?;
        Ok(())
    }

    fn on_network_change(&self, state: &NetworkState) {
        let syncable = state.is_syncable();
        let was_syncable = self.inner.was_syncable.swap(syncable, Ordering::SeqCst);
        if !self.is_running() {
            return;
        }

        if syncable && !was_syncable {
            log::info!(
                "Network available; syncing in {:?}",
                self.inner.config.online_debounce
            );
            self.schedule_debounced_sync();
        } else if !syncable && was_syncable {
            log::info!("Network lost; sync paused");
            if let Some(handle) = lock(&self.inner.debounce).take() {
                handle.abort();
            }
        }
    }

    fn schedule_debounced_sync(&self) {
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No async runtime; sync waits for the next trigger");
            return;
        };

        let engine = Arc::downgrade(&self.inner);
        let delay = self.inner.config.online_debounce;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = engine.upgrade() else {
                return;
            };
            if let Err(e) = (SyncEngine { inner }).trigger_sync().await {
                log::error!("Sync after reconnect failed: {}", e);
            }
        });

        if let Some(previous) = lock(&self.inner.debounce).replace(handle) {
            previous.abort();
        }
    }

    /// Drains one aggregate, or the whole backlog, in the background
    fn spawn_drain(&self, aggregate_id: Option<String>) {
        if !self.is_running() || !self.inner.detector.is_syncable() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            return;
        };

        let engine = self.clone();
        runtime.spawn(async move {
            let result = match aggregate_id {
                Some(id) => engine.sync_aggregate(&id).await.map(|_| ()),
                None => engine.trigger_sync().await.map(|_| ()),
            };
            if let Err(e) = result {
                log::error!("Background sync failed: {}", e);
            }
        });
    }

    fn emit_failure(&self, event: &OutboxEvent, error: &SyncError) {
        self.emit(SettledEvent {
            event_id: event.id,
            aggregate_id: event.aggregate_id.clone(),
            sequence: event.sequence,
            event_type: event.event_type.clone(),
            outcome: SettleOutcome::Failed {
                error: error.to_string(),
                retry_count: event.retry_count.saturating_add(1),
            },
        });
    }

    fn emit(&self, settled: SettledEvent) {
        // No receivers is fine.
        let _ = self.inner.settled.send(settled);
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("running", &self.is_running())
            .field("config", &self.inner.config)
            .finish()
    }
}

fn correlation_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn submit_outcome(event: OutboxEvent, mut report: DrainReport) -> SyncResult<SubmitOutcome> {
    if let Some(index) = report.synced.iter().position(|(id, _)| *id == event.id) {
        let (_, response) = report.synced.swap_remove(index);
        return Ok(SubmitOutcome::Synced { event, response });
    }

    if let Some(failed) = report.failed.take() {
        if failed.event_id == event.id {
            return Err(failed.error);
        }
    }

    let reason = match (report.skipped, report.blocked) {
        (Some(SkipReason::AlreadyDraining), _) => QueueReason::DrainInProgress,
        (Some(SkipReason::NotRunning), _) | (_, Some(BlockReason::Stopped)) => {
            QueueReason::NotRunning
        }
        (Some(SkipReason::NotSyncable), _) | (_, Some(BlockReason::Offline)) => {
            QueueReason::Offline
        }
        _ => QueueReason::Blocked,
    };
    Ok(SubmitOutcome::Queued { event, reason })
}
