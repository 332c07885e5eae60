//! Reading and writing `config.toml`
//!
//! Writes go through a temporary file in the same directory followed by a
//! rename, and the previous file is copied to `config.toml.backup` first.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct ConfigPersistence {
    config_path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.config_path.with_extension("toml.backup")
    }

    /// Reads the config file
    ///
    /// A missing file yields the defaults. An empty or unparsable one is an
    /// error so a damaged file is never overwritten by accident. Out-of-range
    /// values are only logged here; callers decide whether to reject them.
    pub fn load(&self) -> ConfigResult<Config> {
        if !self.config_path.exists() {
            log::info!(
                "No config file at {}, using defaults",
                self.config_path.display()
            );
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.config_path).map_err(|e| ConfigError::ReadError {
            path: self.config_path.clone(),
            source: e,
        })?;

        if contents.trim().is_empty() {
            return Err(ConfigError::EmptyFile {
                path: self.config_path.clone(),
            });
        }

        let config: Config = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: self.config_path.clone(),
            source: e,
        })?;

        if config.version > CONFIG_VERSION {
            log::warn!(
                "Config version {} is newer than {}; unknown keys are ignored",
                config.version,
                CONFIG_VERSION
            );
        }

        if let Err(errors) = config.validate() {
            for error in &errors {
                log::warn!("{}: {}", self.config_path.display(), error);
            }
        }

        Ok(config)
    }

    /// Validates and writes `config`, keeping a copy of the previous file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::InvalidConfig)?;

        let dir = self
            .config_path
            .parent()
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: format!("{} has no parent directory", self.config_path.display()),
            })?;
        ensure_dir(dir)?;

        if self.config_path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.config_path, &backup).map_err(|e| write_error(&backup, e))?;
            log::debug!("Backed up config to {}", backup.display());
        }

        let contents = toml::to_string_pretty(config)?;
        self.replace_file(dir, &contents)?;

        log::info!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    pub fn generate_default(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    fn replace_file(&self, dir: &Path, contents: &str) -> ConfigResult<()> {
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| write_error(dir, e))?;
        temp.write_all(contents.as_bytes())
            .and_then(|_| temp.flush())
            .map_err(|e| write_error(temp.path(), e))?;

        temp.persist(&self.config_path)
            .map_err(|e| write_error(&self.config_path, e.error))?;
        Ok(())
    }
}

fn ensure_dir(path: &Path) -> ConfigResult<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| write_error(path, e))?;
        log::info!("Created config directory {}", path.display());
    }
    Ok(())
}

fn write_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::WriteError {
        path: path.to_path_buf(),
        source,
    }
}
