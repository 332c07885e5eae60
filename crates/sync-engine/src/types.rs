// crates/sync-engine/src/types.rs
//! Types reported by the sync engine

use crate::error::SyncError;
use laboursync_core::{EventId, OutboxEvent, OutboxStats, RemoteResponse};
use serde::{Deserialize, Serialize};

/// Snapshot of the engine and the outbox
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub stats: OutboxStats,
    /// Aggregates currently being drained
    pub active_syncs: usize,
    /// Events waiting on a backoff timer
    pub scheduled_retries: usize,
    pub is_running: bool,
    pub is_online: bool,
    /// Online and on a link good enough to sync over
    pub is_syncable: bool,
}

/// Why a drain did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotRunning,
    NotSyncable,
    /// Another drain of the same aggregate is in progress
    AlreadyDraining,
}

/// Why a drain ended before the aggregate was empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// An earlier event failed and waits for a retry
    Failed,
    /// An earlier event is still in flight
    InFlight,
    /// The next event belongs to a guest profile
    GuestEvent,
    /// The network went away mid-drain
    Offline,
    /// The engine was stopped mid-drain
    Stopped,
}

/// A failed attempt within a drain
#[derive(Debug)]
pub struct FailedAttempt {
    pub event_id: EventId,
    pub sequence: i64,
    pub error: SyncError,
}

/// Result of one drain of an aggregate
#[derive(Debug)]
pub struct DrainReport {
    pub aggregate_id: String,
    /// Events sent successfully, in the order they were sent
    pub synced: Vec<(EventId, RemoteResponse)>,
    /// Attempt that ended the drain, if any
    pub failed: Option<FailedAttempt>,
    /// Set if the drain ended with events still queued
    pub blocked: Option<BlockReason>,
    /// Set if the drain did not run at all
    pub skipped: Option<SkipReason>,
}

impl DrainReport {
    pub(crate) fn new(aggregate_id: impl Into<String>) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            synced: Vec::new(),
            failed: None,
            blocked: None,
            skipped: None,
        }
    }

    pub(crate) fn skipped(aggregate_id: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(aggregate_id)
        }
    }

    pub(crate) fn blocked(mut self, reason: BlockReason) -> Self {
        self.blocked = Some(reason);
        self
    }

    /// Returns true if the drain emptied the aggregate's queue
    pub fn is_complete(&self) -> bool {
        self.skipped.is_none() && self.blocked.is_none() && self.failed.is_none()
    }

    /// Response for an event synced in this drain
    pub fn response_for(&self, event_id: EventId) -> Option<&RemoteResponse> {
        self.synced
            .iter()
            .find(|(id, _)| *id == event_id)
            .map(|(_, response)| response)
    }
}

/// Result of [`SyncEngine::submit`](crate::SyncEngine::submit)
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The event reached the server during the immediate attempt
    Synced {
        event: OutboxEvent,
        response: RemoteResponse,
    },
    /// The event is stored and will be sent later
    Queued { event: OutboxEvent, reason: QueueReason },
}

impl SubmitOutcome {
    /// The stored event
    pub fn event(&self) -> &OutboxEvent {
        match self {
            Self::Synced { event, .. } | Self::Queued { event, .. } => event,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Why a submitted event was not sent immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    NotRunning,
    Offline,
    /// An earlier event of the aggregate has to go first
    Blocked,
    /// A drain of the aggregate is already running and will pick it up
    DrainInProgress,
}

/// Final result of one attempt to send an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettleOutcome {
    Synced { response: RemoteResponse },
    Failed { error: String, retry_count: u32 },
}

/// Notification sent after every attempt to send an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledEvent {
    pub event_id: EventId,
    pub aggregate_id: String,
    pub sequence: i64,
    pub event_type: String,
    #[serde(flatten)]
    pub outcome: SettleOutcome,
}

impl SettledEvent {
    pub fn is_synced(&self) -> bool {
        matches!(self.outcome, SettleOutcome::Synced { .. })
    }
}
