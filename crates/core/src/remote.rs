//! Contract of the remote source of truth
//!
//! One operation per [`EventType`]. Each receives the (already id-translated) event
//! payload and returns either an aggregate snapshot or the id the server assigned
//! to a newly created sub-entity.

use crate::types::EventType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result of a successful remote operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    /// Server-assigned id of the entity the operation created, if any
    pub entity_id: Option<String>,
    /// Updated aggregate as seen by the server
    pub snapshot: Option<Value>,
}

impl RemoteResponse {
    /// A response carrying only a created entity id
    pub fn created(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            snapshot: None,
        }
    }

    /// A response carrying only an aggregate snapshot
    pub fn snapshot(snapshot: Value) -> Self {
        Self {
            entity_id: None,
            snapshot: Some(snapshot),
        }
    }
}

/// Failure reported by the remote service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Request never got a response
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Server answered with an error status
    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Server answered with a body we could not understand
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Remote operations, one per event type
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn plan_labour(&self, payload: &Value) -> Result<RemoteResponse, RemoteError>;

    async fn start_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError>;

    async fn end_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError>;

    async fn update_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError>;

    async fn delete_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError>;

    async fn post_labour_update(&self, payload: &Value) -> Result<RemoteResponse, RemoteError>;

    async fn complete_labour(&self, payload: &Value) -> Result<RemoteResponse, RemoteError>;

    /// Routes a payload to the operation matching `event_type`
    async fn dispatch(
        &self,
        event_type: EventType,
        payload: &Value,
    ) -> Result<RemoteResponse, RemoteError> {
        match event_type {
            EventType::PlanLabour => self.plan_labour(payload).await,
            EventType::StartContraction => self.start_contraction(payload).await,
            EventType::EndContraction => self.end_contraction(payload).await,
            EventType::UpdateContraction => self.update_contraction(payload).await,
            EventType::DeleteContraction => self.delete_contraction(payload).await,
            EventType::PostLabourUpdate => self.post_labour_update(payload).await,
            EventType::CompleteLabour => self.complete_labour(payload).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Recorder {
        fn record(&self, name: &'static str) -> Result<RemoteResponse, RemoteError> {
            self.calls.lock().unwrap().push(name);
            Ok(RemoteResponse::default())
        }
    }

    #[async_trait]
    impl RemoteService for Recorder {
        async fn plan_labour(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
            self.record("plan")
        }
        async fn start_contraction(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
            self.record("start")
        }
        async fn end_contraction(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
            self.record("end")
        }
        async fn update_contraction(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
            self.record("update")
        }
        async fn delete_contraction(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
            self.record("delete")
        }
        async fn post_labour_update(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
            self.record("post")
        }
        async fn complete_labour(&self, _: &Value) -> Result<RemoteResponse, RemoteError> {
            self.record("complete")
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_each_type() {
        let remote = Recorder::default();
        for event_type in EventType::ALL {
            remote.dispatch(event_type, &Value::Null).await.unwrap();
        }
        assert_eq!(
            *remote.calls.lock().unwrap(),
            vec!["plan", "start", "end", "update", "delete", "post", "complete"]
        );
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Rejected {
            status: 422,
            message: "end before start".to_string(),
        };
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("end before start"));
    }
}
