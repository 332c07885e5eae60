// crates/sync-engine/src/outbox.rs
//! Durable outbox of intents waiting to be replayed

use crate::error::SyncResult;
use laboursync_core::{EventId, EventStatus, EventType, OutboxEvent, OutboxStats};
use laboursync_database::{queries::outbox, DbPool};
use serde_json::Value;

/// Append-only log of events plus their lifecycle transitions
///
/// Nothing here touches the network; appends always succeed offline.
#[derive(Clone)]
pub struct OutboxManager {
    pool: DbPool,
}

impl OutboxManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Appends a pending event with the next sequence number of its aggregate
    ///
    /// Sequence allocation and insertion commit together.
    pub async fn add_event(
        &self,
        aggregate_id: &str,
        event_type: EventType,
        payload: Value,
        is_guest_event: bool,
    ) -> SyncResult<OutboxEvent> {
        let event =
            outbox::append_event(&self.pool, aggregate_id, event_type, payload, is_guest_event)
                .await?;
        log::debug!(
            "Queued {} #{} for {}{}",
            event.event_type,
            event.sequence,
            aggregate_id,
            if is_guest_event { " (guest)" } else { "" }
        );
        Ok(event)
    }

    /// Pending events of one aggregate in sequence order
    pub async fn get_pending_events(&self, aggregate_id: &str) -> SyncResult<Vec<OutboxEvent>> {
        Ok(outbox::pending_for_aggregate(&self.pool, aggregate_id).await?)
    }

    /// Pending events across aggregates, oldest first
    pub async fn get_all_pending_events(&self) -> SyncResult<Vec<OutboxEvent>> {
        Ok(outbox::all_pending(&self.pool).await?)
    }

    /// Events of one aggregate not yet synced, in sequence order
    pub async fn get_unsettled_events(&self, aggregate_id: &str) -> SyncResult<Vec<OutboxEvent>> {
        Ok(outbox::unsettled_for_aggregate(&self.pool, aggregate_id).await?)
    }

    /// Every stored event of one aggregate
    pub async fn get_events_for_aggregate(&self, aggregate_id: &str) -> SyncResult<Vec<OutboxEvent>> {
        Ok(outbox::events_for_aggregate(&self.pool, aggregate_id).await?)
    }

    /// Aggregates with pending non-guest events
    pub async fn get_pending_aggregates(&self) -> SyncResult<Vec<String>> {
        Ok(outbox::pending_aggregate_ids(&self.pool).await?)
    }

    /// Aggregates with any stored event
    pub async fn get_aggregates(&self) -> SyncResult<Vec<String>> {
        Ok(outbox::aggregate_ids(&self.pool).await?)
    }

    pub async fn get_event(&self, event_id: EventId) -> SyncResult<Option<OutboxEvent>> {
        Ok(outbox::get_event(&self.pool, event_id).await?)
    }

    pub async fn mark_event_syncing(&self, event_id: EventId) -> SyncResult<()> {
        Ok(outbox::set_status(&self.pool, event_id, EventStatus::Syncing).await?)
    }

    /// Completes an event
    ///
    /// Non-guest events are deleted; guest events stay as `synced` until their
    /// profile is upgraded or erased.
    pub async fn mark_event_synced(&self, event_id: EventId) -> SyncResult<()> {
        let deleted = outbox::complete_event(&self.pool, event_id).await?;
        log::trace!("Event {} synced (deleted: {})", event_id, deleted);
        Ok(())
    }

    /// Marks an event failed and increments its retry count
    pub async fn mark_event_failed(&self, event_id: EventId, error: &str) -> SyncResult<()> {
        Ok(outbox::mark_failed(&self.pool, event_id, error).await?)
    }

    /// Returns a failed event to `pending`, keeping its retry count
    pub async fn retry_event(&self, event_id: EventId) -> SyncResult<()> {
        Ok(outbox::set_status(&self.pool, event_id, EventStatus::Pending).await?)
    }

    /// Failed events with fewer than `max_retries` failures
    pub async fn get_retriable_events(&self, max_retries: u32) -> SyncResult<Vec<OutboxEvent>> {
        Ok(outbox::retriable_events(&self.pool, max_retries).await?)
    }

    pub async fn get_events_by_status(&self, status: EventStatus) -> SyncResult<Vec<OutboxEvent>> {
        Ok(outbox::events_by_status(&self.pool, status).await?)
    }

    pub async fn get_guest_events(&self) -> SyncResult<Vec<OutboxEvent>> {
        Ok(outbox::guest_events(&self.pool).await?)
    }

    /// Clears the guest flag on the given events so they become syncable
    pub async fn mark_guest_events_upgraded(&self, event_ids: &[EventId]) -> SyncResult<u64> {
        Ok(outbox::clear_guest_flag(&self.pool, event_ids).await?)
    }

    /// Deletes synced non-guest events; guest events are kept
    pub async fn prune_synced_events(&self) -> SyncResult<u64> {
        let pruned = outbox::prune_synced(&self.pool).await?;
        if pruned > 0 {
            log::info!("Pruned {} synced events", pruned);
        }
        Ok(pruned)
    }

    pub async fn get_stats(&self) -> SyncResult<OutboxStats> {
        Ok(outbox::stats(&self.pool).await?)
    }

    /// Returns events stuck in `syncing` after an interrupted run to `pending`
    pub async fn recover_interrupted_events(&self) -> SyncResult<u64> {
        let recovered = outbox::reset_syncing(&self.pool).await?;
        if recovered > 0 {
            log::warn!("Recovered {} events interrupted mid-sync", recovered);
        }
        Ok(recovered)
    }

    pub async fn delete_events_for_aggregate(&self, aggregate_id: &str) -> SyncResult<u64> {
        Ok(outbox::delete_for_aggregate(&self.pool, aggregate_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use laboursync_core::AppError;
    use laboursync_database::open_in_memory;
    use serde_json::json;

    async fn manager() -> OutboxManager {
        OutboxManager::new(open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_add_event_is_pending() {
        let outbox = manager().await;
        let event = outbox
            .add_event("labour-a", EventType::PlanLabour, json!({"first": true}), false)
            .await
            .unwrap();

        assert_eq!(event.sequence, 1);
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.retry_count, 0);
        assert_eq!(outbox.get_event(event.id).await.unwrap(), Some(event));
    }

    #[tokio::test]
    async fn test_failure_counting_and_retry() {
        let outbox = manager().await;
        let event = outbox
            .add_event("labour-a", EventType::PlanLabour, json!({}), false)
            .await
            .unwrap();

        for _ in 0..3 {
            outbox.mark_event_syncing(event.id).await.unwrap();
            outbox.mark_event_failed(event.id, "503").await.unwrap();
        }

        let failed = outbox.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(failed.status, EventStatus::Failed);
        assert_eq!(failed.retry_count, 3);
        assert_eq!(failed.last_error.as_deref(), Some("503"));

        outbox.retry_event(event.id).await.unwrap();
        let retried = outbox.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(retried.status, EventStatus::Pending);
        assert_eq!(retried.retry_count, 3);
    }

    #[tokio::test]
    async fn test_synced_non_guest_is_deleted_guest_is_kept() {
        let outbox = manager().await;
        let normal = outbox
            .add_event("labour-a", EventType::PlanLabour, json!({}), false)
            .await
            .unwrap();
        let guest = outbox
            .add_event("guest-labour-g", EventType::PlanLabour, json!({}), true)
            .await
            .unwrap();

        outbox.mark_event_synced(normal.id).await.unwrap();
        outbox.mark_event_synced(guest.id).await.unwrap();

        assert!(outbox.get_event(normal.id).await.unwrap().is_none());
        let kept = outbox.get_event(guest.id).await.unwrap().unwrap();
        assert_eq!(kept.status, EventStatus::Synced);
        assert_eq!(outbox.prune_synced_events().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_event_transition() {
        let outbox = manager().await;
        let result = outbox.mark_event_syncing(EventId::new()).await;
        assert!(matches!(
            result,
            Err(SyncError::Storage(AppError::RecordNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_recover_interrupted_events() {
        let outbox = manager().await;
        let event = outbox
            .add_event("labour-a", EventType::PlanLabour, json!({}), false)
            .await
            .unwrap();
        outbox.mark_event_syncing(event.id).await.unwrap();

        assert_eq!(outbox.recover_interrupted_events().await.unwrap(), 1);
        assert_eq!(outbox.get_pending_events("labour-a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_guest_events_upgraded() {
        let outbox = manager().await;
        let a = outbox
            .add_event("guest-labour-g", EventType::PlanLabour, json!({}), true)
            .await
            .unwrap();
        outbox
            .add_event("guest-labour-g", EventType::StartContraction, json!({}), true)
            .await
            .unwrap();

        assert_eq!(outbox.mark_guest_events_upgraded(&[a.id]).await.unwrap(), 1);
        assert_eq!(outbox.get_guest_events().await.unwrap().len(), 1);
        assert_eq!(outbox.get_stats().await.unwrap().guest, 1);
    }
}
