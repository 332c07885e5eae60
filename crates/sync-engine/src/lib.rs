// crates/sync-engine/src/lib.rs
//! Offline-first synchronization engine
//!
//! Every user intent is first appended to a durable outbox and only then sent to
//! the remote service. This crate provides:
//! - Per-aggregate sequence numbering
//! - The outbox and its event lifecycle
//! - Reconciliation of temporary ids with server-assigned ids
//! - Guest mode, where events stay local until the profile is upgraded
//! - The engine draining the outbox in order, with retries and network awareness
//!
//! # Example
//!
//! ```rust,no_run
//! use laboursync_core::EventType;
//! use laboursync_network::{Client, ConnectivityChecker, HttpRemoteService, NetworkDetector};
//! use laboursync_sync_engine::{SyncConfig, SyncEngine};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = laboursync_database::open_in_memory().await?;
//! let client = Client::new()?;
//! let remote = Arc::new(HttpRemoteService::new(client.clone(), "https://api.example.com"));
//! let detector = NetworkDetector::new(ConnectivityChecker::new(client));
//!
//! let engine = SyncEngine::new(pool, remote, detector, SyncConfig::default());
//! engine.start().await?;
//!
//! let outcome = engine
//!     .submit(
//!         "labour-user-1",
//!         EventType::StartContraction,
//!         serde_json::json!({"start_time": "2024-05-01T10:00:00Z"}),
//!     )
//!     .await?;
//! println!("sent immediately: {}", outcome.is_synced());
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
mod guest;
mod id_map;
mod outbox;
mod sequence;
mod types;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use guest::GuestModeManager;
pub use id_map::{IdLookup, IdentifierReconciler, CORRELATION_TOLERANCE_MS};
pub use outbox::OutboxManager;
pub use sequence::SequenceManager;
pub use types::{
    BlockReason, DrainReport, FailedAttempt, QueueReason, SettleOutcome, SettledEvent,
    SkipReason, SubmitOutcome, SyncStatus,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: SyncConfig = SyncConfig::default();
        let _: SyncStatus = SyncStatus::default();
        let _: IdLookup = IdLookup::Unknown("id".to_string());
        assert_eq!(CORRELATION_TOLERANCE_MS, 1_000);
    }
}
