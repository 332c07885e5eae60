//! Local store configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SQLite store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file path (relative to the config dir if not absolute)
    pub database_path: PathBuf,

    /// Maximum pooled connections
    pub max_connections: u32,

    /// Use write-ahead logging
    pub enable_wal: bool,

    /// How long a writer waits for a lock, in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("laboursync.db"),
            max_connections: 4,
            enable_wal: true,
            busy_timeout_ms: 5000,
        }
    }
}

impl ConfigSection for StorageSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();

        if self.database_path.as_os_str().is_empty() {
            results.push(Err(ValidationError::new(
                "storage.database_path",
                "must not be empty",
            )));
        }

        results.push(Validator::in_range(
            self.max_connections,
            1,
            64,
            "storage.max_connections",
        ));
        results.push(Validator::in_range(
            self.busy_timeout_ms,
            0,
            120_000,
            "storage.busy_timeout_ms",
        ));

        Validator::collect_errors(results)
    }

    fn section_name(&self) -> &'static str {
        "storage"
    }
}
