//! Renderer error types.

use card_core::CardError;
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur during rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No suitable paint backend available.
    #[error("No rendering backend available: {0}")]
    NoBackend(String),

    /// Resource loading or decoding failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Rasterizing, encoding or assembling the output failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Template error surfaced while composing.
    #[error(transparent)]
    Core(#[from] CardError),
}
