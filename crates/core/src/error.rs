//! Storage error taxonomy shared by the laboursync crates
//!
//! Every failure of the local store surfaces as an [`AppError`]. Errors are
//! graded so callers can tell a busy database, which is worth another try,
//! from a damaged one, which is not.

use std::fmt;
use thiserror::Error;

/// How bad a storage failure is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Another attempt may succeed (the database was busy)
    Recoverable,
    /// This operation failed; the store is still usable
    Degraded,
    /// The store cannot be used until someone repairs it
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    /// A statement or transaction failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// SQLite reported the database as busy or locked past the busy timeout
    #[error("Database locked: {operation}")]
    DatabaseLocked { operation: String },

    #[error("Database corrupted: {details}")]
    DatabaseCorrupted { details: String },

    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// A status transition or lookup named a row that does not exist
    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    /// A stored row could not be decoded (unknown status, bad id, malformed JSON)
    #[error("Invalid stored data in {entity}: {reason}")]
    InvalidData { entity: String, reason: String },
}

impl AppError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DatabaseLocked { .. } => ErrorSeverity::Recoverable,
            Self::DatabaseCorrupted { .. } | Self::MigrationFailed { .. } => ErrorSeverity::Fatal,
            Self::DatabaseError { .. } | Self::RecordNotFound { .. } | Self::InvalidData { .. } => {
                ErrorSeverity::Degraded
            }
        }
    }

    /// Returns true if repeating the operation may succeed
    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Recoverable
    }

    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Wraps a driver error
    ///
    /// Busy and locked errors become [`AppError::DatabaseLocked`] so they are
    /// reported as retryable.
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        let message = message.into();
        let detail = source.to_string();
        if detail.contains("database is locked") || detail.contains("database is busy") {
            return Self::DatabaseLocked { operation: message };
        }

        Self::DatabaseError {
            message,
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::RecordNotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn invalid_data(entity: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidData {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
