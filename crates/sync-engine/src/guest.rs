// crates/sync-engine/src/guest.rs
//! Guest mode: local-only use before the user signs in
//!
//! A guest profile owns one aggregate (`guest-labour-<guest_id>`). Its events are
//! stored like any other but flagged as guest events, so the engine never sends
//! them. Upgrading the profile clears the flag and the backlog syncs normally.

use crate::error::SyncResult;
use crate::outbox::OutboxManager;
use laboursync_core::{
    guest_aggregate_id, AppError, EventType, GuestExport, GuestProfile, OutboxEvent, Timestamp,
};
use laboursync_database::queries::{guest_profiles, identifier_map, outbox, sequences};
use laboursync_database::DbPool;
use serde_json::Value;

/// Manages guest profiles and their data
#[derive(Clone)]
pub struct GuestModeManager {
    pool: DbPool,
    outbox: OutboxManager,
}

impl GuestModeManager {
    pub fn new(pool: DbPool) -> Self {
        Self {
            outbox: OutboxManager::new(pool.clone()),
            pool,
        }
    }

    /// Returns the active guest profile, creating one if none exists
    ///
    /// An existing profile is touched, so it counts as active again.
    pub async fn get_or_create_profile(&self) -> SyncResult<GuestProfile> {
        if let Some(mut profile) = guest_profiles::current_profile(&self.pool).await? {
            let now = Timestamp::now();
            guest_profiles::update_last_active(&self.pool, &profile.guest_id, now).await?;
            profile.last_active_at = now;
            return Ok(profile);
        }

        let profile = GuestProfile::new();
        guest_profiles::insert_profile(&self.pool, &profile).await?;
        log::info!("Created guest profile {}", profile.guest_id);
        Ok(profile)
    }

    /// Most recently active profile that has not been upgraded
    pub async fn current_profile(&self) -> SyncResult<Option<GuestProfile>> {
        Ok(guest_profiles::current_profile(&self.pool).await?)
    }

    pub async fn get_profile(&self, guest_id: &str) -> SyncResult<Option<GuestProfile>> {
        Ok(guest_profiles::get_profile(&self.pool, guest_id).await?)
    }

    pub async fn list_profiles(&self) -> SyncResult<Vec<GuestProfile>> {
        Ok(guest_profiles::list_profiles(&self.pool).await?)
    }

    /// Records activity on a profile
    pub async fn touch(&self, guest_id: &str) -> SyncResult<()> {
        Ok(guest_profiles::update_last_active(&self.pool, guest_id, Timestamp::now()).await?)
    }

    /// Adds an entity id to the profile's entity list; duplicates are ignored
    pub async fn add_entity(&self, guest_id: &str, entity_id: &str) -> SyncResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin entity update", e))?;

        let mut profile = guest_profiles::get_profile(&mut *tx, guest_id)
            .await?
            .ok_or_else(|| AppError::not_found("GuestProfile", guest_id))?;

        if !profile.entities.iter().any(|e| e == entity_id) {
            profile.entities.push(entity_id.to_string());
            guest_profiles::update_entities(&mut *tx, guest_id, &profile.entities).await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit entity update", e))?;
        Ok(())
    }

    /// Aggregate that holds a guest's events
    pub fn aggregate_id_for(&self, guest_id: &str) -> String {
        guest_aggregate_id(guest_id)
    }

    /// Appends a guest event to the profile's aggregate
    pub async fn record_event(
        &self,
        guest_id: &str,
        event_type: EventType,
        payload: Value,
    ) -> SyncResult<OutboxEvent> {
        self.touch(guest_id).await?;
        self.outbox
            .add_event(&self.aggregate_id_for(guest_id), event_type, payload, true)
            .await
    }

    /// Hands a guest's data over to the signed-in user
    ///
    /// Clears the guest flag on every event of the profile (sequences and payloads
    /// are unchanged) and marks the profile upgraded, in one transaction. Upgrading
    /// an upgraded profile does nothing. Returns the number of events released.
    pub async fn upgrade_to_authenticated_mode(&self, guest_id: &str) -> SyncResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin guest upgrade", e))?;

        let profile = guest_profiles::get_profile(&mut *tx, guest_id)
            .await?
            .ok_or_else(|| AppError::not_found("GuestProfile", guest_id))?;

        if profile.is_upgraded {
            log::debug!("Guest profile {} already upgraded", guest_id);
            return Ok(0);
        }

        let released =
            outbox::clear_guest_flag_for_aggregate(&mut *tx, &profile.aggregate_id()).await?;
        guest_profiles::mark_upgraded(&mut *tx, guest_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit guest upgrade", e))?;

        log::info!(
            "Upgraded guest profile {} ({} events released for sync)",
            guest_id,
            released
        );
        Ok(released)
    }

    /// Deletes a profile with its events, sequence counter and id mappings
    pub async fn clear_guest_data(&self, guest_id: &str) -> SyncResult<()> {
        let aggregate_id = self.aggregate_id_for(guest_id);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database("Failed to begin guest erasure", e))?;

        let events = outbox::delete_for_aggregate(&mut *tx, &aggregate_id).await?;
        identifier_map::delete_for_aggregate(&mut *tx, &aggregate_id).await?;
        sequences::delete_sequence(&mut *tx, &aggregate_id).await?;
        let profiles = guest_profiles::delete_profile(&mut *tx, guest_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::database("Failed to commit guest erasure", e))?;

        if profiles == 0 {
            log::warn!("Cleared data of unknown guest profile {}", guest_id);
        }
        log::info!("Cleared guest {} ({} events)", guest_id, events);
        Ok(())
    }

    /// Snapshot of a profile and all its events
    pub async fn export_guest_data(&self, guest_id: &str) -> SyncResult<GuestExport> {
        let profile = guest_profiles::get_profile(&self.pool, guest_id)
            .await?
            .ok_or_else(|| AppError::not_found("GuestProfile", guest_id))?;
        let events = self
            .outbox
            .get_events_for_aggregate(&profile.aggregate_id())
            .await?;

        Ok(GuestExport {
            profile,
            events,
            exported_at: Timestamp::now(),
        })
    }

    /// Erases non-upgraded profiles inactive for more than `days_inactive` days
    ///
    /// Upgraded profiles are never removed. Returns the number of profiles erased.
    pub async fn cleanup_inactive_profiles(&self, days_inactive: u32) -> SyncResult<usize> {
        let cutoff = Timestamp::now().minus_days(days_inactive);
        let stale: Vec<GuestProfile> = guest_profiles::inactive_profiles(&self.pool, cutoff)
            .await?
            .into_iter()
            .filter(|p| !p.is_upgraded)
            .collect();

        for profile in &stale {
            self.clear_guest_data(&profile.guest_id).await?;
        }

        if !stale.is_empty() {
            log::info!(
                "Removed {} guest profiles inactive for {} days",
                stale.len(),
                days_inactive
            );
        }
        Ok(stale.len())
    }
}
