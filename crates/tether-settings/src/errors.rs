//! Settings errors.

use thiserror::Error;

/// Why settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("settings file unreadable: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON, or does not fit the schema.
    #[error("settings file malformed: {0}")]
    Json(#[from] serde_json::Error),
    /// Loaded settings fail validation.
    #[error("settings rejected: {0}")]
    InvalidValue(String),
}

/// Settings result alias.
pub type Result<T> = std::result::Result<T, SettingsError>;
