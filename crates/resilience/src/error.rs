// crates/resilience/src/error.rs
//! Error types for resilience operations

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Policy parameters are inconsistent
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error() {
        let err = ResilienceError::Timeout(std::time::Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_invalid_policy_error() {
        let err = ResilienceError::InvalidPolicy("multiplier below 1".to_string());
        assert!(err.to_string().contains("multiplier below 1"));
    }
}
