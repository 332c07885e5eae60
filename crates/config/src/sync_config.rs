//! Sync engine configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Sync engine timing and retry behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    /// Pause between two successfully synced events of one aggregate, in milliseconds
    pub inter_event_delay_ms: u64,

    /// Wait after coming back online before draining, in milliseconds
    pub online_debounce_ms: u64,

    /// Failed events with fewer failures than this are reset by a bulk retry
    pub max_retries: u32,

    /// First backoff step in milliseconds
    pub backoff_base_ms: u64,

    /// Longest backoff in milliseconds
    pub backoff_max_ms: u64,

    /// Stop scheduling automatic retries after this many failures; unbounded if unset
    pub max_auto_retries: Option<u32>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            inter_event_delay_ms: 150,
            online_debounce_ms: 1000,
            max_retries: 5,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
            max_auto_retries: None,
        }
    }
}

impl ConfigSection for SyncSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(self.inter_event_delay_ms, 0, 10_000, "sync.inter_event_delay_ms"),
            Validator::in_range(self.online_debounce_ms, 0, 60_000, "sync.online_debounce_ms"),
            Validator::in_range(self.max_retries, 1, 100, "sync.max_retries"),
            Validator::in_range(self.backoff_base_ms, 1, 60_000, "sync.backoff_base_ms"),
            Validator::in_range(self.backoff_max_ms, 1, 3_600_000, "sync.backoff_max_ms"),
            Validator::ordered(
                self.backoff_base_ms,
                self.backoff_max_ms,
                "sync.backoff_base_ms",
                "sync.backoff_max_ms",
            ),
            Validator::optional_at_least(self.max_auto_retries, 1, "sync.max_auto_retries"),
        ])
    }

    fn section_name(&self) -> &'static str {
        "sync"
    }
}
