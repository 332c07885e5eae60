// crates/resilience/src/timeout.rs
//! Deadline for a single async operation

use crate::error::{ResilienceError, ResilienceResult};
use std::future::Future;
use std::time::Duration;

/// Runs `operation`, failing with [`ResilienceError::Timeout`] once `duration` has passed
///
/// The operation's own output is passed through unchanged, so a fallible
/// operation yields a nested result.
pub async fn with_timeout<F, T>(duration: Duration, operation: F) -> ResilienceResult<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, operation)
        .await
        .map_err(|_| ResilienceError::Timeout(duration))
}
