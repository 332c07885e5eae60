//! Error types for loading and saving `config.toml`

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but holds nothing; never silently replaced by defaults
    #[error("Config file at {path} is empty")]
    EmptyFile { path: PathBuf },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Directory creation, backup copy or the final rename failed
    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    #[error("Could not determine config directory path: {reason}")]
    PathResolutionError { reason: String },

    /// A `LABOURSYNC_*` variable could not be parsed into its field
    #[error("Invalid value for {variable}: {reason}")]
    EnvOverrideError { variable: String, reason: String },
}

impl ConfigError {
    /// Fields rejected by validation, empty for every other error
    pub fn invalid_fields(&self) -> Vec<&str> {
        match self {
            Self::InvalidConfig(errors) => errors.iter().map(|e| e.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A rejected config field, named by its dotted path (e.g. `sync.max_retries`)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Field '{field}': {message}{}", .value.as_ref().map(|v| format!(" (got: {})", v)).unwrap_or_default())]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Creates an error that also reports the rejected value
    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: Some(value.to_string()),
        }
    }
}
