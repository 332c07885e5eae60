//! Outbox event domain model

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Aggregate type tag for labour streams
pub const LABOUR_AGGREGATE_TYPE: &str = "labour";

/// Returns the aggregate id of an authenticated user's labour stream
pub fn labour_aggregate_id(user_id: &str) -> String {
    format!("labour-{}", user_id)
}

/// Returns the aggregate id of a guest profile's labour stream
pub fn guest_aggregate_id(guest_id: &str) -> String {
    format!("guest-labour-{}", guest_id)
}

/// Unique identifier for an outbox event
///
/// Backed by a UUIDv7, so the textual form sorts by creation time and ids created
/// by the same process within the same millisecond still sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new time-ordered EventId
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an EventId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the EventId as a string
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of intents the sync core knows how to replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Plan a new labour
    PlanLabour,
    /// Start a contraction (creates a sub-entity)
    StartContraction,
    /// End a running contraction
    EndContraction,
    /// Edit an existing contraction
    UpdateContraction,
    /// Delete a contraction
    DeleteContraction,
    /// Post a note / status update
    PostLabourUpdate,
    /// Complete the labour
    CompleteLabour,
}

impl EventType {
    /// Every event type, in declaration order
    pub const ALL: [EventType; 7] = [
        EventType::PlanLabour,
        EventType::StartContraction,
        EventType::EndContraction,
        EventType::UpdateContraction,
        EventType::DeleteContraction,
        EventType::PostLabourUpdate,
        EventType::CompleteLabour,
    ];

    /// Returns the storage / wire name of this event type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanLabour => "plan_labour",
            Self::StartContraction => "start_contraction",
            Self::EndContraction => "end_contraction",
            Self::UpdateContraction => "update_contraction",
            Self::DeleteContraction => "delete_contraction",
            Self::PostLabourUpdate => "post_labour_update",
            Self::CompleteLabour => "complete_labour",
        }
    }

    /// Payload field holding the correlation key of an entity this event creates
    pub fn correlation_field(&self) -> Option<&'static str> {
        match self {
            Self::StartContraction => Some("start_time"),
            _ => None,
        }
    }

    /// Payload fields that may hold a client-side temporary id
    pub fn reference_fields(&self) -> &'static [&'static str] {
        match self {
            Self::EndContraction | Self::UpdateContraction | Self::DeleteContraction => {
                &["contraction_id"]
            }
            _ => &[],
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type '{}'", s))
    }
}

/// Lifecycle status of an outbox event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl EventStatus {
    /// Returns the storage name of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "syncing" => Ok(Self::Syncing),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown event status '{}'", other)),
        }
    }
}

/// A durable, ordered intent waiting to be replayed against the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: EventId,
    pub aggregate_id: String,
    pub aggregate_type: String,
    /// Raw event type name; rows written by other versions may hold unknown names
    pub event_type: String,
    pub sequence: i64,
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub created_at: Timestamp,
    pub retry_count: u32,
    pub is_guest_event: bool,
    pub last_error: Option<String>,
}

impl OutboxEvent {
    /// Creates a new pending event
    pub fn new(
        aggregate_id: impl Into<String>,
        event_type: EventType,
        sequence: i64,
        payload: serde_json::Value,
        is_guest_event: bool,
    ) -> Self {
        Self {
            id: EventId::new(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: LABOUR_AGGREGATE_TYPE.to_string(),
            event_type: event_type.as_str().to_string(),
            sequence,
            payload,
            status: EventStatus::Pending,
            created_at: Timestamp::now(),
            retry_count: 0,
            is_guest_event,
            last_error: None,
        }
    }

    /// Returns the typed event type, or None if the stored name is unknown
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    /// Returns true if the event is waiting to be sent
    pub fn is_pending(&self) -> bool {
        self.status == EventStatus::Pending
    }
}
