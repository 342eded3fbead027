//! Error types for the adapter service.

use thiserror::Error;

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Main error type for adapter operations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Outbound connection could not be established.
    #[error("connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// Outbound connection attempt exceeded its deadline.
    #[error("connect to {endpoint} timed out after {timeout_ms}ms")]
    ConnectTimeout { endpoint: String, timeout_ms: u64 },

    /// Neither data nor heartbeat traffic within the silence timeout.
    #[error("connection silent for {silent_for_ms}ms, treating as dead")]
    HeartbeatTimeout { silent_for_ms: u64 },

    /// Stream ended inside a length-prefixed asset payload.
    #[error("asset payload truncated: expected {expected} bytes")]
    TruncatedAssetPayload { expected: usize },

    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Adapter settings the service cannot run with.
    #[error("configuration error: {0}")]
    Configuration(String),
}
