//! Domain types for laboursync
//!
//! - `event`: outbox events, event types and statuses
//! - `mapping`: temporary-to-real identifier mappings
//! - `guest`: guest profiles and exports
//! - `stats`: outbox statistics
//! - `common`: timestamps

mod common;
mod event;
mod guest;
mod mapping;
mod stats;

pub use common::Timestamp;
pub use event::{
    guest_aggregate_id, labour_aggregate_id, EventId, EventStatus, EventType, OutboxEvent,
    LABOUR_AGGREGATE_TYPE,
};
pub use guest::{GuestExport, GuestProfile};
pub use mapping::IdentifierMapping;
pub use stats::OutboxStats;
