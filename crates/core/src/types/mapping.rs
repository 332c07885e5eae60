//! Temporary-to-real identifier mappings

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Links a client-generated id to the id the server eventually assigns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierMapping {
    pub temp_id: String,
    pub aggregate_id: String,
    /// Value known to both client and server (e.g. the contraction start time)
    pub correlation_key: String,
    pub real_id: Option<String>,
    pub created_at: Timestamp,
}

impl IdentifierMapping {
    /// Creates an unresolved mapping
    pub fn new(
        aggregate_id: impl Into<String>,
        temp_id: impl Into<String>,
        correlation_key: impl Into<String>,
    ) -> Self {
        Self {
            temp_id: temp_id.into(),
            aggregate_id: aggregate_id.into(),
            correlation_key: correlation_key.into(),
            real_id: None,
            created_at: Timestamp::now(),
        }
    }

    /// Returns true once the server id is known
    pub fn is_resolved(&self) -> bool {
        self.real_id.is_some()
    }
}
