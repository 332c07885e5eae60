//! Environment variable overrides
//!
//! Variables follow the pattern `LABOURSYNC_<SECTION>_<FIELD>`, e.g.
//! `LABOURSYNC_SYNC_MAX_RETRIES=8`. Optional fields are cleared by an empty value.

use crate::{Config, ConfigError, ConfigResult};
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix shared by every override variable
pub const ENV_PREFIX: &str = "LABOURSYNC";

/// Applies every override `lookup` knows about and returns the variables used
pub(crate) fn apply<F>(config: &mut Config, lookup: F) -> ConfigResult<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();
    let mut source = Source {
        lookup: &lookup,
        applied: &mut applied,
    };

    source.parse("SYNC_INTER_EVENT_DELAY_MS", &mut config.sync.inter_event_delay_ms)?;
    source.parse("SYNC_ONLINE_DEBOUNCE_MS", &mut config.sync.online_debounce_ms)?;
    source.parse("SYNC_MAX_RETRIES", &mut config.sync.max_retries)?;
    source.parse("SYNC_BACKOFF_BASE_MS", &mut config.sync.backoff_base_ms)?;
    source.parse("SYNC_BACKOFF_MAX_MS", &mut config.sync.backoff_max_ms)?;
    source.parse_optional("SYNC_MAX_AUTO_RETRIES", &mut config.sync.max_auto_retries)?;

    source.parse("NETWORK_BASE_URL", &mut config.network.base_url)?;
    source.parse_optional("NETWORK_AUTH_TOKEN", &mut config.network.auth_token)?;
    source.parse("NETWORK_REQUEST_TIMEOUT_SECS", &mut config.network.request_timeout_secs)?;
    source.parse("NETWORK_PROBE_TIMEOUT_MS", &mut config.network.probe_timeout_ms)?;
    source.parse("NETWORK_MONITOR_INTERVAL_SECS", &mut config.network.monitor_interval_secs)?;
    if let Some(urls) = source.get("NETWORK_PROBE_URLS") {
        config.network.probe_urls = urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(path) = source.get("STORAGE_DATABASE_PATH") {
        config.storage.database_path = PathBuf::from(path);
    }
    source.parse("STORAGE_MAX_CONNECTIONS", &mut config.storage.max_connections)?;
    source.parse("STORAGE_ENABLE_WAL", &mut config.storage.enable_wal)?;
    source.parse("STORAGE_BUSY_TIMEOUT_MS", &mut config.storage.busy_timeout_ms)?;

    source.parse("GUEST_INACTIVE_DAYS", &mut config.guest.inactive_days)?;
    source.parse("GUEST_CLEANUP_ON_START", &mut config.guest.cleanup_on_start)?;

    Ok(applied)
}

struct Source<'a, F> {
    lookup: &'a F,
    applied: &'a mut Vec<String>,
}

impl<F> Source<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&mut self, key: &str) -> Option<String> {
        let variable = format!("{}_{}", ENV_PREFIX, key);
        let value = (self.lookup)(&variable)?;
        self.applied.push(variable);
        Some(value)
    }

    fn parse<T>(&mut self, key: &str, target: &mut T) -> ConfigResult<()>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(raw) = self.get(key) {
            *target = parse_value(key, raw.trim())?;
        }
        Ok(())
    }

    fn parse_optional<T>(&mut self, key: &str, target: &mut Option<T>) -> ConfigResult<()>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(raw) = self.get(key) {
            let raw = raw.trim();
            *target = if raw.is_empty() {
                None
            } else {
                Some(parse_value(key, raw)?)
            };
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::EnvOverrideError {
            variable: format!("{}_{}", ENV_PREFIX, key),
            reason: e.to_string(),
        })
}
