//! Guest (unauthenticated, local-only) profiles

use crate::types::{guest_aggregate_id, OutboxEvent, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fully local session used before the user signs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestProfile {
    pub guest_id: String,
    pub created_at: Timestamp,
    /// Ids of the entities created while in guest mode
    pub entities: Vec<String>,
    pub is_upgraded: bool,
    pub last_active_at: Timestamp,
}

impl GuestProfile {
    /// Creates a fresh, active profile
    pub fn new() -> Self {
        let now = Timestamp::now();
        Self {
            guest_id: Uuid::new_v4().to_string(),
            created_at: now,
            entities: Vec::new(),
            is_upgraded: false,
            last_active_at: now,
        }
    }

    /// Returns the aggregate id this profile's events are recorded under
    pub fn aggregate_id(&self) -> String {
        guest_aggregate_id(&self.guest_id)
    }
}

impl Default for GuestProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// Downloadable snapshot of everything recorded in guest mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestExport {
    pub profile: GuestProfile,
    pub events: Vec<OutboxEvent>,
    pub exported_at: Timestamp,
}
