// crates/network/src/error.rs
//! Error types for network operations

use laboursync_core::RemoteError;
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Body could not be decoded
    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    /// Network unavailable
    #[error("Network is unavailable")]
    NetworkUnavailable,

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// Resilience error
    #[error("Resilience error: {0}")]
    Resilience(#[from] laboursync_resilience::ResilienceError),
}

impl NetworkError {
    /// Returns true if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Timeout | NetworkError::NetworkUnavailable => true,
            NetworkError::Http(_) => !self.is_client_error(),
            NetworkError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the error is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        match self {
            NetworkError::Http(e) => e.status().is_some_and(|s| s.is_client_error()),
            NetworkError::Status { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Returns true if the error is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        match self {
            NetworkError::Http(e) => e.status().is_some_and(|s| s.is_server_error()),
            NetworkError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<NetworkError> for RemoteError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Status { status, message } => RemoteError::Rejected { status, message },
            NetworkError::InvalidResponse(reason) => RemoteError::InvalidResponse(reason),
            other => RemoteError::Transport(other.to_string()),
        }
    }
}
