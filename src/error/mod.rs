//! Error types for claude-meter.

use thiserror::Error;

use crate::auth::AuthError;
use crate::client::FetchError;

/// Primary error type for operations outside the polling loop.
///
/// The coordinator never surfaces this type to subscribers; it publishes
/// [`crate::coordinator::PollFailure`] instead.
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Usage fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Broad classification used for retry decisions and user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Network,
    Timeout,
    Server,
    Configuration,
    Serialization,
    Io,
    Unknown,
}

impl MeterError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidArgument(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Io,
            Self::Auth(AuthError::Network(_)) => ErrorCategory::Network,
            Self::Auth(AuthError::Timeout(_)) => ErrorCategory::Timeout,
            Self::Auth(AuthError::Io(_)) => ErrorCategory::Io,
            Self::Auth(AuthError::Serialization(_)) => ErrorCategory::Serialization,
            Self::Auth(_) => ErrorCategory::Authentication,
            Self::Fetch(FetchError::Unauthorized) => ErrorCategory::Authentication,
            Self::Fetch(FetchError::Transient { status, .. }) => match status {
                Some(500..=599) => ErrorCategory::Server,
                Some(_) => ErrorCategory::Unknown,
                None => ErrorCategory::Network,
            },
        }
    }

    /// Whether waiting for the next poll may resolve this error on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, MeterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejection_is_not_retryable() {
        let err = MeterError::from(AuthError::Rejected {
            status: 400,
            body: "invalid_grant".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert!(!err.is_retryable());
    }

    #[test]
    fn refresh_timeout_is_retryable() {
        let err = MeterError::from(AuthError::Timeout(15_000));
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = MeterError::from(FetchError::Transient {
            status: Some(503),
            message: "unavailable".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Server);
        assert!(err.is_retryable());
    }

    #[test]
    fn unauthorized_fetch_is_authentication() {
        let err = MeterError::from(FetchError::Unauthorized);
        assert_eq!(err.category(), ErrorCategory::Authentication);
    }
}
