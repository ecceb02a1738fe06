//! Remote configuration error types.

/// Errors raised while loading, persisting or fetching remote configuration.
#[derive(Debug, thiserror::Error)]
pub enum RemoteConfigError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configuration endpoint answered with a non-success status.
    #[error("remote config fetch returned status {0}")]
    Status(u16),
}

/// Result type for remote configuration operations.
pub type Result<T> = std::result::Result<T, RemoteConfigError>;
