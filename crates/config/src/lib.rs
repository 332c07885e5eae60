//! laboursync Configuration System
//!
//! Settings for the sync core, persisted as TOML. Every section implements
//! [`ConfigSection`] so it can validate itself.
//!
//! # Architecture
//!
//! - **Trait-based**: each concern defines its settings as a type implementing `ConfigSection`
//! - **Strict on use**: out-of-range values are logged on load and rejected before use or save
//! - **Atomic writes**: config files are never left in a corrupted state
//! - **Overrides**: `LABOURSYNC_<SECTION>_<FIELD>` environment variables win over the file
//!
//! # Example
//!
//! ```rust,no_run
//! use laboursync_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Posting events to {}", config.network.base_url);
//! ```

mod error;
mod manager;
mod overrides;
mod persistence;
mod validation;

// Config sections
mod guest_config;
mod network_config;
mod storage_config;
mod sync_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::ConfigManager;
pub use overrides::ENV_PREFIX;
pub use validation::{ConfigSection, Validator};

// Re-export config sections
pub use guest_config::GuestSettings;
pub use network_config::NetworkSettings;
pub use storage_config::StorageSettings;
pub use sync_config::SyncSettings;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Sync engine behavior
    pub sync: SyncSettings,

    /// Remote endpoint and connectivity probing
    pub network: NetworkSettings,

    /// Local store
    pub storage: StorageSettings,

    /// Guest profile retention
    pub guest: GuestSettings,
}

impl Config {
    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.sync.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.network.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.storage.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.guest.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            sync: SyncSettings::default(),
            network: NetworkSettings::default(),
            storage: StorageSettings::default(),
            guest: GuestSettings::default(),
        }
    }
}
