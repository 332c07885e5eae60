// crates/sync-engine/src/config.rs
//! Runtime configuration of the sync engine

use laboursync_config::SyncSettings;
use laboursync_resilience::RetryPolicy;
use std::time::Duration;

/// Configuration for the sync engine
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Pause after each successfully synced event of an aggregate
    pub inter_event_delay: Duration,
    /// Wait after the network comes back before draining
    pub online_debounce: Duration,
    /// Failure ceiling for the bulk retry path
    pub max_retries: u32,
    /// Backoff for automatic per-event retries
    pub retry_policy: RetryPolicy,
    /// Buffered settled notifications per subscriber
    pub settled_capacity: usize,
}

impl SyncConfig {
    /// Configuration without pauses, for tests and batch tools
    pub fn immediate() -> Self {
        Self {
            inter_event_delay: Duration::ZERO,
            online_debounce: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Sets the inter-event delay
    pub fn with_inter_event_delay(mut self, delay: Duration) -> Self {
        self.inter_event_delay = delay;
        self
    }

    /// Sets the online debounce
    pub fn with_online_debounce(mut self, debounce: Duration) -> Self {
        self.online_debounce = debounce;
        self
    }

    /// Sets the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the bulk retry ceiling
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            inter_event_delay: Duration::from_millis(150),
            online_debounce: Duration::from_millis(1000),
            max_retries: 5,
            retry_policy: RetryPolicy::default(),
            settled_capacity: 256,
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        let retry_policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(settings.backoff_base_ms))
            .with_max_delay(Duration::from_millis(settings.backoff_max_ms))
            .with_max_retries(settings.max_auto_retries);

        Self {
            inter_event_delay: Duration::from_millis(settings.inter_event_delay_ms),
            online_debounce: Duration::from_millis(settings.online_debounce_ms),
            max_retries: settings.max_retries,
            retry_policy,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_settings_default() {
        let from_settings = SyncConfig::from(&SyncSettings::default());
        assert_eq!(from_settings, SyncConfig::default());
    }

    #[test]
    fn test_from_settings() {
        let settings = SyncSettings {
            inter_event_delay_ms: 0,
            backoff_base_ms: 500,
            backoff_max_ms: 4_000,
            max_auto_retries: Some(3),
            ..SyncSettings::default()
        };
        let config = SyncConfig::from(&settings);

        assert_eq!(config.inter_event_delay, Duration::ZERO);
        assert_eq!(config.retry_policy.max_retries(), Some(3));
        assert_eq!(
            config.retry_policy.delay_after_failures(0),
            Duration::from_millis(1_000)
        );
        assert_eq!(
            config.retry_policy.delay_after_failures(5),
            Duration::from_millis(4_000)
        );
    }

    #[test]
    fn test_immediate() {
        let config = SyncConfig::immediate();
        assert_eq!(config.inter_event_delay, Duration::ZERO);
        assert_eq!(config.online_debounce, Duration::ZERO);
        assert_eq!(config.max_retries, 5);
    }
}
