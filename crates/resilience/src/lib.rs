// crates/resilience/src/lib.rs
//! Resilience patterns for the sync engine
//!
//! This module provides:
//! - Exponential backoff for failed outbox events
//! - A deadline helper for connectivity probes
//!
//! # Example
//!
//! ```rust
//! use laboursync_resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new()
//!     .with_initial_delay(Duration::from_secs(1))
//!     .with_max_delay(Duration::from_secs(30));
//!
//! assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::RetryPolicy;
pub use timeout::with_timeout;
