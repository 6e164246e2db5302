//! Errors raised while talking to the storage services.

use card_core::CardError;
use thiserror::Error;

/// Errors that can occur when talking to the storage services.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base URL provided by configuration is invalid.
    #[error("invalid service URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, timeout, etc.).
    #[error("service request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// A payload could not be parsed.
    #[error("failed to parse service payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The service rejected the request.
    #[error("service error {status}: {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Message reported by the service.
        message: String,
    },
    /// The request was refused before it was sent.
    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    /// Returns true if this error is retryable (transient HTTP failures).
    ///
    /// Connection failures, timeouts and server-side statuses (5xx, 429) are
    /// retried; a rejected payload never is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Service { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidUrl(_) | Self::Json(_) | Self::Validation(_) => false,
        }
    }
}

impl From<CardError> for ClientError {
    fn from(err: CardError) -> Self {
        match err {
            CardError::Validation(message) => Self::Validation(message),
            CardError::Serialization(e) => Self::Json(e),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let server = |status| ClientError::Service {
            status,
            message: "boom".into(),
        };
        assert!(server(500).is_retryable());
        assert!(server(503).is_retryable());
        assert!(server(429).is_retryable());
        assert!(!server(400).is_retryable());
        assert!(!server(404).is_retryable());
    }

    #[test]
    fn test_non_http_errors_are_not_retryable() {
        assert!(!ClientError::InvalidUrl("bad".into()).is_retryable());
        assert!(!ClientError::Validation("no name".into()).is_retryable());
    }

    #[test]
    fn test_validation_keeps_its_message() {
        let err = ClientError::from(CardError::Validation("Please enter a template name".into()));
        assert_eq!(err.to_string(), "Please enter a template name");
    }
}
