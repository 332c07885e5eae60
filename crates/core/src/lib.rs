//! laboursync core
//!
//! Shared domain model for the offline-first sync core: outbox events and their
//! lifecycle, identifier mappings, guest profiles, the error taxonomy, and the
//! contract the remote service has to fulfil.

pub mod error;
pub mod remote;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorSeverity, Result};
pub use remote::{RemoteError, RemoteResponse, RemoteService};
pub use types::{
    guest_aggregate_id, labour_aggregate_id, EventId, EventStatus, EventType, GuestExport,
    GuestProfile, IdentifierMapping, OutboxEvent, OutboxStats, Timestamp, LABOUR_AGGREGATE_TYPE,
};
