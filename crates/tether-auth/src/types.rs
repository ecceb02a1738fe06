//! Persisted auth state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Seconds before expiry at which a token is treated as expired.
pub const TOKEN_EXPIRY_BUFFER_SECONDS: i64 = 300;

/// Contents of `auth.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthStorage {
    /// File format version. Only `1` is understood.
    pub version: u32,
    /// Current bearer token.
    #[serde(default)]
    pub access_token: String,
    /// Refresh token, if the issuer handed one out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry in epoch milliseconds. `0` means "never expires".
    #[serde(default)]
    pub expires_at: i64,
    /// Token endpoint used for refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    /// Discovery documents stapled by the issuer, keyed by server API URL.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stapled_well_known: BTreeMap<String, serde_json::Value>,
    /// RFC 3339 timestamp of the last write.
    #[serde(default)]
    pub last_updated: String,
}

impl AuthStorage {
    /// Empty storage holding no token.
    pub fn new() -> Self {
        Self {
            version: 1,
            access_token: String::new(),
            refresh_token: None,
            expires_at: 0,
            token_url: None,
            stapled_well_known: BTreeMap::new(),
            last_updated: String::new(),
        }
    }

    /// Whether a bearer token is stored.
    pub fn has_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Stapled discovery document for `endpoint`, as raw JSON text.
    ///
    /// String values are returned verbatim; any other JSON value is serialized.
    pub fn stapled_for(&self, endpoint: &str) -> Option<String> {
        match self.stapled_well_known.get(endpoint)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl Default for AuthStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Expiry timestamp for a token that lives `expires_in_seconds` from now.
pub fn calculate_expires_at(expires_in_seconds: i64) -> i64 {
    now_ms() + expires_in_seconds * 1000
}

/// Whether a token expiring at `expires_at` needs a refresh at `now`.
pub fn should_refresh(expires_at: i64, now: i64) -> bool {
    expires_at != 0 && now + TOKEN_EXPIRY_BUFFER_SECONDS * 1000 >= expires_at
}
