// crates/sync-engine/src/sequence.rs
//! Per-aggregate sequence numbering

use crate::error::SyncResult;
use laboursync_database::{queries::sequences, DbPool};
use std::collections::HashSet;

/// Issues monotonically increasing sequence numbers per aggregate
#[derive(Clone)]
pub struct SequenceManager {
    pool: DbPool,
}

impl SequenceManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Allocates the next sequence number for an aggregate
    ///
    /// The first call for an aggregate returns 1. Concurrent callers always
    /// receive distinct values.
    pub async fn next_sequence(&self, aggregate_id: &str) -> SyncResult<i64> {
        Ok(sequences::next_sequence(&self.pool, aggregate_id).await?)
    }

    /// Last issued sequence number, 0 if none was issued
    pub async fn current_sequence(&self, aggregate_id: &str) -> SyncResult<i64> {
        Ok(sequences::current_sequence(&self.pool, aggregate_id).await?)
    }

    /// Forgets the counter so numbering restarts at 1
    pub async fn reset_sequence(&self, aggregate_id: &str) -> SyncResult<()> {
        sequences::delete_sequence(&self.pool, aggregate_id).await?;
        log::debug!("Reset sequence for {}", aggregate_id);
        Ok(())
    }

    /// Overrides the counter; the next allocation returns `sequence + 1`
    pub async fn set_sequence(&self, aggregate_id: &str, sequence: i64) -> SyncResult<()> {
        Ok(sequences::set_sequence(&self.pool, aggregate_id, sequence).await?)
    }

    /// Deletes counters of aggregates not in `live_aggregates`
    pub async fn cleanup_orphaned_sequences(
        &self,
        live_aggregates: &HashSet<String>,
    ) -> SyncResult<u64> {
        let removed = sequences::delete_sequences_except(&self.pool, live_aggregates).await?;
        if removed > 0 {
            log::info!("Removed {} orphaned sequence counters", removed);
        }
        Ok(removed)
    }
}
