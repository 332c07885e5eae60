// crates/network/src/remote.rs
//! JSON-over-HTTP implementation of the remote service
//!
//! Every event type maps to `POST <base_url>/<event_type>` with the event payload
//! as body. The server answers with an optional JSON object of the shape
//! `{"entity_id": "...", "snapshot": {...}}`; both fields may be absent.

use crate::client::Client;
use async_trait::async_trait;
use laboursync_core::{EventType, RemoteError, RemoteResponse, RemoteService};
use serde_json::Value;

/// Remote service reached over HTTP
#[derive(Clone)]
pub struct HttpRemoteService {
    client: Client,
    base_url: String,
}

impl HttpRemoteService {
    /// Creates a service rooted at `base_url`
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Returns the endpoint an event type is posted to
    pub fn endpoint(&self, event_type: EventType) -> String {
        format!("{}/{}", self.base_url, event_type.as_str())
    }

    async fn send(
        &self,
        event_type: EventType,
        payload: &Value,
    ) -> Result<RemoteResponse, RemoteError> {
        let url = self.endpoint(event_type);
        log::debug!("POST {}", url);

        let body = self.client.post_json(&url, payload).await?;
        decode_response(body)
    }
}

fn decode_response(body: Value) -> Result<RemoteResponse, RemoteError> {
    match body {
        Value::Null => Ok(RemoteResponse::default()),
        Value::Object(_) => serde_json::from_value(body)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string())),
        other => Err(RemoteError::InvalidResponse(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn plan_labour(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(EventType::PlanLabour, payload).await
    }

    async fn start_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(EventType::StartContraction, payload).await
    }

    async fn end_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(EventType::EndContraction, payload).await
    }

    async fn update_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(EventType::UpdateContraction, payload).await
    }

    async fn delete_contraction(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(EventType::DeleteContraction, payload).await
    }

    async fn post_labour_update(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(EventType::PostLabourUpdate, payload).await
    }

    async fn complete_labour(&self, payload: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(EventType::CompleteLabour, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let remote = HttpRemoteService::new(Client::new().unwrap(), "https://api.example.com/v1/");
        assert_eq!(
            remote.endpoint(EventType::StartContraction),
            "https://api.example.com/v1/start_contraction"
        );
    }

    #[test]
    fn test_decode_response() {
        assert_eq!(decode_response(Value::Null).unwrap(), RemoteResponse::default());

        let created = decode_response(json!({"entity_id": "real-abc"})).unwrap();
        assert_eq!(created, RemoteResponse::created("real-abc"));

        let snapshot = decode_response(json!({"snapshot": {"id": "labour-1"}})).unwrap();
        assert_eq!(snapshot.snapshot, Some(json!({"id": "labour-1"})));

        assert!(matches!(
            decode_response(json!([1, 2])),
            Err(RemoteError::InvalidResponse(_))
        ));
    }
}
