//! Settings types.
//!
//! Every struct is `camelCase` on disk and fully defaulted, so a settings file
//! only needs the keys it wants to change.

use serde::{Deserialize, Serialize};
use tether_core::{ForeverRetryPolicy, ServerIdentity, TransportSet};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TetherSettings {
    /// Selected server.
    pub server: ServerSettings,
    /// Transport preferences.
    pub transport: TransportSettings,
    /// HTTP client behavior (discovery, negotiate, polling).
    pub http: HttpSettings,
    /// Duplex connection behavior.
    pub connection: ConnectionSettings,
    /// Reconnect backoff bounds.
    pub reconnect: ForeverRetryPolicy,
    /// Signed remote configuration source.
    pub remote_config: RemoteConfigSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl TetherSettings {
    /// The server identity described by these settings.
    pub fn server_identity(&self) -> ServerIdentity {
        ServerIdentity::new(&self.server.name, &self.server.api_url)
    }
}

/// The server the client talks to.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Display name.
    pub name: String,
    /// Canonical API URL.
    pub api_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            api_url: "https://localhost/".to_string(),
        }
    }
}

/// Transport preferences fed to the negotiator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Preferred transports. Empty means "let the resolved config decide".
    pub preferred: TransportSet,
    /// Widen the preferred set to every less capable transport.
    pub allow_fallback: bool,
    /// Force the platform-restriction rule on or off. `None` auto-detects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_restricted: Option<bool>,
    /// Keep WebSockets even on restricted platforms.
    pub force_full_transport: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            preferred: TransportSet::empty(),
            allow_fallback: true,
            platform_restricted: None,
            force_full_transport: false,
        }
    }
}

/// HTTP client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSettings {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Duplex connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Deflate-compress message frames.
    pub compress: bool,
    /// How long a graceful stop may take before the supervisor is abandoned.
    pub stop_timeout_ms: u64,
    /// How long to wait for the protocol handshake response.
    pub handshake_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            compress: true,
            stop_timeout_ms: 5_000,
            handshake_timeout_ms: 15_000,
        }
    }
}

/// Signed remote configuration source. Both fields must be set for the signed
/// fetch to run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfigSettings {
    /// URL serving a signed envelope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64 Ed25519 public key the envelope must verify against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl RemoteConfigSettings {
    /// URL and key, when both are configured.
    pub fn signed_source(&self) -> Option<(&str, &str)> {
        match (self.url.as_deref(), self.public_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = TetherSettings::default();
        assert_eq!(s.server.name, "default");
        assert!(s.transport.preferred.is_empty());
        assert!(s.transport.allow_fallback);
        assert!(s.transport.platform_restricted.is_none());
        assert_eq!(s.http.timeout_ms, 10_000);
        assert!(s.connection.compress);
        assert_eq!(s.reconnect.max_delay_ms, 30_000);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn camel_case_on_disk() {
        let json = serde_json::to_value(TetherSettings::default()).unwrap();
        assert!(json["server"]["apiUrl"].is_string());
        assert!(json["transport"]["allowFallback"].is_boolean());
        assert!(json["connection"]["stopTimeoutMs"].is_number());
        assert!(json["reconnect"]["baseDelayMs"].is_number());
    }

    #[test]
    fn signed_source_needs_both_fields() {
        let mut rc = RemoteConfigSettings::default();
        assert!(rc.signed_source().is_none());
        rc.url = Some("https://cfg.example/signed".into());
        assert!(rc.signed_source().is_none());
        rc.public_key = Some(String::new());
        assert!(rc.signed_source().is_none());
        rc.public_key = Some("AAAA".into());
        assert_eq!(rc.signed_source(), Some(("https://cfg.example/signed", "AAAA")));
    }

    #[test]
    fn server_identity_from_settings() {
        let mut s = TetherSettings::default();
        s.server.api_url = "https://sync.example/".into();
        let id = s.server_identity();
        assert_eq!(id.api_url, "https://sync.example/");
        assert_eq!(id.name, "default");
    }
}
