//! Outbox statistics

use serde::{Deserialize, Serialize};

/// Event counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxStats {
    pub pending: usize,
    pub syncing: usize,
    pub synced: usize,
    pub failed: usize,
    /// Events still flagged as guest events, regardless of status
    pub guest: usize,
}

impl OutboxStats {
    /// Returns the number of rows in the outbox
    pub fn total(&self) -> usize {
        self.pending + self.syncing + self.synced + self.failed
    }

    /// Returns true if nothing is waiting to be sent
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.syncing == 0 && self.failed == 0
    }
}
