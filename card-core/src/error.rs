//! Error types for template operations.

use thiserror::Error;

/// Result type for template operations.
pub type CardResult<T> = Result<T, CardError>;

/// Errors that can occur in template operations.
#[derive(Debug, Error)]
pub enum CardError {
    /// Element index does not exist in the template.
    #[error("Element not found: {0}")]
    ElementNotFound(usize),

    /// A gesture carried values that would produce a degenerate element.
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    /// User-facing validation failure; the operation was aborted.
    #[error("{0}")]
    Validation(String),

    /// The template is open read-only.
    #[error("Template is open in view mode")]
    ReadOnly,

    /// Template serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
