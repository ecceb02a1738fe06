//! Connection parameters and the pure field-by-field merge.
//!
//! A [`ConnectionConfig`] may come from several sources (remote configuration,
//! a discovery document, a synthesized default). Sources are frequently partial,
//! so every field is optional on input and [`merge`] backfills empty fields from a
//! fallback without mutating either input.

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::HUB_PATH;
use crate::transport::TransportSet;

/// Concrete endpoint and transport parameters for one server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// Duplex hub endpoint (`wss://host/hub`, `https://host/hub`, ...).
    #[serde(deserialize_with = "null_as_default")]
    pub hub_url: String,
    /// HTTP API base URL of the server.
    #[serde(deserialize_with = "null_as_default")]
    pub api_url: String,
    /// Transports to offer. Empty means "unspecified".
    pub transports: TransportSet,
    /// Connect straight to the transport without the negotiate round-trip.
    #[serde(deserialize_with = "null_as_default")]
    pub skip_negotiation: bool,
}

impl ConnectionConfig {
    /// Synthesize the default config for a server: hub at `<api_url>/hub`,
    /// transports unspecified.
    pub fn synthesized_for(api_url: &str) -> Self {
        Self {
            hub_url: default_hub_url(api_url),
            api_url: api_url.to_string(),
            transports: TransportSet::empty(),
            skip_negotiation: false,
        }
    }

    /// Whether the config names a hub endpoint.
    pub fn has_hub_url(&self) -> bool {
        !self.hub_url.trim().is_empty()
    }
}

/// Derive `<api_url>/<HUB_PATH>`, tolerating a trailing slash on the API URL.
pub fn default_hub_url(api_url: &str) -> String {
    format!("{}/{HUB_PATH}", api_url.trim_end_matches('/'))
}

/// Merge two configs, preferring `primary` and backfilling each empty field
/// (hub URL, API URL, transports) from `fallback`.
///
/// `skip_negotiation` is always taken from `primary`. An explicitly empty
/// transport set in `primary` is indistinguishable from an absent one and is
/// backfilled.
pub fn merge(primary: ConnectionConfig, fallback: &ConnectionConfig) -> ConnectionConfig {
    ConnectionConfig {
        hub_url: non_empty_or(primary.hub_url, &fallback.hub_url),
        api_url: non_empty_or(primary.api_url, &fallback.api_url),
        transports: if primary.transports.is_empty() {
            fallback.transports
        } else {
            primary.transports
        },
        skip_negotiation: primary.skip_negotiation,
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Treat an explicit JSON `null` the same as a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ─────────────────────────────────────────────────────────────────────────────
// ServerIdentity
// ─────────────────────────────────────────────────────────────────────────────

/// The logical server a client is pointed at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerIdentity {
    /// Human-readable server name.
    pub name: String,
    /// Canonical API URL. Cached resolutions are keyed on this exact string.
    pub api_url: String,
}

impl ServerIdentity {
    /// Create a server identity.
    pub fn new(name: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_url: api_url.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
