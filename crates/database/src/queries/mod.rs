//! Database query operations organized by collection

pub mod guest_profiles;
pub mod identifier_map;
pub mod outbox;
pub mod sequences;

// Re-export commonly used query functions
pub use guest_profiles::{current_profile, get_profile, insert_profile, list_profiles};
pub use identifier_map::{find_by_temp_id, insert_mapping, set_real_id, unresolved_for_aggregate};
pub use outbox::{
    append_event, complete_event, get_event, mark_failed, pending_for_aggregate, set_status,
    stats,
};
pub use sequences::{current_sequence, next_sequence};
