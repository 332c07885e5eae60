// crates/sync-engine/src/id_map.rs
//! Reconciliation of client-side temporary ids with server-assigned ids
//!
//! An entity created offline gets a temporary id plus a correlation key (the
//! creation timestamp). When the server acknowledges the creation, the mapping is
//! resolved by correlation key and later events referencing the temporary id are
//! rewritten before they are sent.

use crate::error::SyncResult;
use chrono::DateTime;
use laboursync_core::{AppError, IdentifierMapping};
use laboursync_database::{queries::identifier_map, DbPool};

/// Largest distance between two timestamp keys that still counts as a match
pub const CORRELATION_TOLERANCE_MS: i64 = 1_000;

/// What an id found in a payload refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdLookup {
    /// Temporary id with a known server id
    Resolved(String),
    /// Temporary id the server has not assigned an id to yet
    Unresolved(String),
    /// Not a known temporary id; used as-is
    Unknown(String),
}

impl IdLookup {
    /// The id to transmit, if one is available
    pub fn sendable(&self) -> Option<&str> {
        match self {
            Self::Resolved(id) | Self::Unknown(id) => Some(id),
            Self::Unresolved(_) => None,
        }
    }
}

/// Maps temporary ids to real ids
#[derive(Clone)]
pub struct IdentifierReconciler {
    pool: DbPool,
}

impl IdentifierReconciler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Records a temporary id waiting for its server id
    pub async fn add_temp_mapping(
        &self,
        aggregate_id: &str,
        temp_id: &str,
        correlation_key: &str,
    ) -> SyncResult<()> {
        let mapping = IdentifierMapping::new(aggregate_id, temp_id, correlation_key);
        identifier_map::insert_mapping(&self.pool, &mapping).await?;
        Ok(())
    }

    /// Assigns `real_id` to the unresolved mappings of an aggregate matching
    /// `correlation_key`
    ///
    /// Exact key matches win. Only when none exist are keys compared as RFC 3339
    /// timestamps within [`CORRELATION_TOLERANCE_MS`]. Returns the number of
    /// mappings resolved.
    pub async fn resolve_by_correlation(
        &self,
        aggregate_id: &str,
        correlation_key: &str,
        real_id: &str,
    ) -> SyncResult<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin id resolution", e))?;

        let unresolved = identifier_map::unresolved_for_aggregate(&mut *tx, aggregate_id).await?;

        let mut matching: Vec<&IdentifierMapping> = unresolved
            .iter()
            .filter(|m| m.correlation_key == correlation_key)
            .collect();
        if matching.is_empty() {
            matching = unresolved
                .iter()
                .filter(|m| keys_within_tolerance(&m.correlation_key, correlation_key))
                .collect();
        }

        for mapping in &matching {
            identifier_map::set_real_id(&mut *tx, &mapping.temp_id, real_id).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit id resolution", e))?;

        match matching.len() {
            0 => log::debug!(
                "No temp id waiting on {} in {} (real id {})",
                correlation_key,
                aggregate_id,
                real_id
            ),
            n => log::debug!("Resolved {} temp id(s) in {} to {}", n, aggregate_id, real_id),
        }

        Ok(matching.len())
    }

    /// Returns the real id for `candidate`, or `candidate` itself if it has none
    pub async fn get_real_id_for(&self, aggregate_id: &str, candidate: &str) -> SyncResult<String> {
        Ok(match self.lookup(aggregate_id, candidate).await? {
            IdLookup::Resolved(id) | IdLookup::Unresolved(id) | IdLookup::Unknown(id) => id,
        })
    }

    /// Classifies an id found in a payload of `aggregate_id`
    pub async fn lookup(&self, aggregate_id: &str, candidate: &str) -> SyncResult<IdLookup> {
        let mapping = identifier_map::find_by_temp_id(&self.pool, candidate).await?;

        Ok(match mapping {
            Some(m) if m.aggregate_id == aggregate_id => match m.real_id {
                Some(real_id) => IdLookup::Resolved(real_id),
                None => IdLookup::Unresolved(m.temp_id),
            },
            _ => IdLookup::Unknown(candidate.to_string()),
        })
    }

    /// Every mapping of an aggregate
    pub async fn mappings_for(&self, aggregate_id: &str) -> SyncResult<Vec<IdentifierMapping>> {
        Ok(identifier_map::mappings_for_aggregate(&self.pool, aggregate_id).await?)
    }

    /// Deletes every mapping of an aggregate
    pub async fn clear_for_aggregate(&self, aggregate_id: &str) -> SyncResult<u64> {
        Ok(identifier_map::delete_for_aggregate(&self.pool, aggregate_id).await?)
    }
}

fn keys_within_tolerance(stored: &str, given: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(stored),
        DateTime::parse_from_rfc3339(given),
    ) {
        (Ok(a), Ok(b)) => (a - b).num_milliseconds().abs() <= CORRELATION_TOLERANCE_MS,
        _ => false,
    }
}
