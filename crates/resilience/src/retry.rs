// crates/resilience/src/retry.rs
//! Retry policies with exponential backoff

use crate::error::{ResilienceError, ResilienceResult};
use std::time::Duration;

/// Retry policy configuration
///
/// Attempt numbering starts at 1: the delay before attempt `n` is
/// `initial_delay * multiplier^(n - 1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of automatic retries, `None` for unbounded
    max_retries: Option<u32>,
    /// Initial delay between retries
    initial_delay: Duration,
    /// Maximum delay between retries
    max_delay: Duration,
    /// Backoff multiplier
    multiplier: f64,
}

impl RetryPolicy {
    /// Creates an unbounded policy starting at one second and capped at thirty
    pub fn new() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Limits the number of automatic retries
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Checks that the parameters describe a non-decreasing backoff
    pub fn validate(&self) -> ResilienceResult<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ResilienceError::InvalidPolicy(format!(
                "multiplier must be at least 1, got {}",
                self.multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(ResilienceError::InvalidPolicy(format!(
                "initial delay {:?} exceeds max delay {:?}",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Calculates the delay for a given attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay as u64)
    }

    /// Delay before re-running an event whose failure count was `retry_count`
    /// when the failing attempt started
    ///
    /// A first failure (`retry_count == 0`) waits two base delays.
    pub fn delay_after_failures(&self, retry_count: u32) -> Duration {
        self.delay_for_attempt(retry_count.saturating_add(2))
    }

    /// Returns true if another automatic retry is allowed after `retry_count` failures
    pub fn allows_retry(&self, retry_count: u32) -> bool {
        self.max_retries.is_none_or(|max| retry_count < max)
    }

    /// Returns the retry ceiling
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Returns the initial delay
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Returns the maximum delay
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), None);
        assert_eq!(policy.initial_delay(), Duration::from_secs(1));
        assert_eq!(policy.max_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::new()
            .with_max_retries(Some(5))
            .with_initial_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(60))
            .with_multiplier(3.0);

        assert_eq!(policy.max_retries(), Some(5));
        assert_eq!(policy.initial_delay, Duration::from_millis(200));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.multiplier, 3.0);
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_multiplier(2.0);

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_capping() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_after_failures() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_after_failures(0), Duration::from_secs(2));
        assert_eq!(policy.delay_after_failures(1), Duration::from_secs(4));
        assert_eq!(policy.delay_after_failures(2), Duration::from_secs(8));
        assert_eq!(policy.delay_after_failures(3), Duration::from_secs(16));
        assert_eq!(policy.delay_after_failures(4), Duration::from_secs(30));
        assert_eq!(policy.delay_after_failures(40), Duration::from_secs(30));
    }

    #[test]
    fn test_allows_retry() {
        assert!(RetryPolicy::new().allows_retry(1_000));

        let bounded = RetryPolicy::new().with_max_retries(Some(3));
        assert!(bounded.allows_retry(2));
        assert!(!bounded.allows_retry(3));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::new().validate().is_ok());
        assert!(RetryPolicy::new().with_multiplier(0.5).validate().is_err());
        assert!(RetryPolicy::new()
            .with_initial_delay(Duration::from_secs(60))
            .validate()
            .is_err());
    }
}
