//! Auth error types.

/// Errors that can occur while obtaining a bearer token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The token endpoint rejected the refresh.
    #[error("token refresh failed ({status}): {message}")]
    Refresh {
        /// HTTP status code.
        status: u16,
        /// Response body or description.
        message: String,
    },

    /// Token has expired and cannot be refreshed.
    #[error("token expired and refresh is unavailable: {0}")]
    TokenExpired(String),

    /// No credentials are stored.
    #[error("not signed in: {0}")]
    NotConfigured(String),

    /// The caller cancelled the request.
    #[error("token request cancelled")]
    Cancelled,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
