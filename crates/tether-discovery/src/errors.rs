//! Discovery error types.
//!
//! Resolution never fails; these describe why a discovery source was skipped.

/// Reasons a discovery document could not be used.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The hub URL has no host or an unsupported scheme.
    #[error("cannot derive discovery URL from {0:?}")]
    InvalidUrl(String),

    /// HTTP request failed (connect, timeout, redirect limit).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status.
    #[error("discovery returned status {0}")]
    Status(u16),

    /// Response is not `application/json`.
    #[error("unexpected discovery content type {0:?}")]
    ContentType(String),

    /// Body is not a connection config.
    #[error("malformed discovery document: {0}")]
    Json(#[from] serde_json::Error),
}
