//! Locates `config.toml` and loads it with environment overrides applied

use crate::persistence::ConfigPersistence;
use crate::{overrides, Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// Entry point for reading and writing the client configuration
///
/// Relative paths inside the file (the database path in particular) are
/// resolved against the directory holding `config.toml`.
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses the platform config directory
    ///
    /// - Linux: `~/.config/laboursync/`
    /// - macOS: `~/Library/Application Support/laboursync/`
    /// - Windows: `%APPDATA%\laboursync\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = ProjectDirs::from("", "", "laboursync")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "no home directory for the current user".to_string(),
            })?;
        Self::with_directory(config_dir)
    }

    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        Ok(Self {
            persistence: ConfigPersistence::new(config_dir.join(CONFIG_FILE)),
            config_dir,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Absolute location of the local store described by `config`
    pub fn database_path(&self, config: &Config) -> PathBuf {
        let path = &config.storage.database_path;
        if path.is_absolute() {
            path.clone()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Reads the file as-is; a missing file yields the defaults
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Like [`load`](Self::load), but any error yields the defaults
    pub fn load_or_default(&self) -> Config {
        self.load().unwrap_or_else(|e| {
            log::warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        })
    }

    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Writes a default config file unless one exists
    ///
    /// Returns true if a file was written.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::debug!("Config already present at {}", self.config_path().display());
            return Ok(false);
        }

        self.persistence.generate_default()?;
        Ok(true)
    }

    /// Loads the file, applies `LABOURSYNC_<SECTION>_<FIELD>` variables and validates
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        self.load_with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`load_with_env_overrides`](Self::load_with_env_overrides) with a custom variable source
    pub fn load_with_overrides<F>(&self, lookup: F) -> ConfigResult<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.load()?;

        for variable in overrides::apply(&mut config, lookup)? {
            log::info!("Config override from {}", variable);
        }

        config.validate().map_err(ConfigError::InvalidConfig)?;
        Ok(config)
    }
}
