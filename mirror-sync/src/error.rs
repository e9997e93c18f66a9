//! Error types for the sync engine and its transports.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while fetching one request.
///
/// Every variant counts as a transport failure and is retried up to the
/// configured cap.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device base URL is invalid.
    #[error("invalid device URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The device answered with a non-success status.
    #[error("device returned status {0}")]
    Status(u16),
    /// The body was not a decodable response document.
    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),
    /// The connection went away before a response arrived.
    #[error("transport closed: {0}")]
    Closed(String),
}

impl TransportError {
    /// Returns true if the failure came from the network rather than the
    /// payload.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Closed(_))
    }
}

/// Errors surfaced by the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The main drawing failed and the engine stopped.
    #[error("sync stopped for {drawing}: {message}")]
    Fatal {
        /// Drawing that failed.
        drawing: String,
        /// User-visible message.
        message: String,
    },

    /// The engine is in the fatal state and refuses new work.
    #[error("sync engine is stopped")]
    Stopped,
}
