//! Error types for drawing store and update operations.

use thiserror::Error;

/// Result type for drawing operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors that can occur while applying or caching drawings.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The response did not match any expected structure.
    #[error("Malformed response for drawing {drawing}: {reason}")]
    MalformedResponse {
        /// Drawing the response was meant for.
        drawing: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Document serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred in the persistent cache.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MirrorError {
    /// Shorthand for a [`MirrorError::MalformedResponse`].
    #[must_use]
    pub fn malformed(drawing: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            drawing: drawing.into(),
            reason: reason.into(),
        }
    }
}
