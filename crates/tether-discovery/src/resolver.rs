//! Connection configuration resolution.
//!
//! Precedence, first hit wins:
//! 1. In-memory cached resolution for the same API URL (no I/O)
//! 2. Stapled discovery document from the token provider (no network)
//! 3. One live `GET` of the well-known discovery endpoint
//! 4. The per-server default
//!
//! The default is `<api_url>/hub` unless the remote `mainServer` section
//! names a hub. Discovery results are merged over the default field by field
//! and cached; failures return the default uncached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tether_auth::TokenProvider;
use tether_core::constants::{DISCOVERY_MAX_REDIRECTS, MAIN_SERVER_SECTION};
use tether_core::{ConnectionConfig, ServerIdentity, merge};
use tether_remote_config::RemoteConfigCache;
use tracing::{debug, info, warn};

use crate::errors::DiscoveryError;
use crate::well_known::{fetch_well_known, well_known_url};

/// Resolves a server identity to concrete connection parameters.
#[async_trait]
pub trait ResolveConfig: Send + Sync {
    /// Resolve `server`. Never fails: the worst case is the synthesized default.
    async fn resolve(&self, server: &ServerIdentity) -> ConnectionConfig;

    /// Drop any cached resolution.
    fn invalidate(&self);
}

/// The `mainServer` remote configuration section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MainServerSection {
    /// Connection parameters.
    #[serde(flatten)]
    pub config: ConnectionConfig,
    /// Keep WebSockets even on restricted platforms.
    pub force_full_transport: bool,
}

/// Read the `mainServer` section from the remote configuration.
pub async fn main_server_section(remote: &RemoteConfigCache) -> Option<MainServerSection> {
    remote
        .current_document()
        .await
        .section_as::<MainServerSection>(MAIN_SERVER_SECTION)
}

/// Build the HTTP client used for discovery.
pub fn discovery_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(DISCOVERY_MAX_REDIRECTS))
        .timeout(timeout)
        .build()
}

#[derive(Clone, Debug)]
struct CachedResolution {
    config: ConnectionConfig,
    resolved_for_endpoint: String,
}

/// Default [`ResolveConfig`] implementation.
pub struct ConfigurationResolver {
    tokens: Arc<dyn TokenProvider>,
    remote: Arc<RemoteConfigCache>,
    client: reqwest::Client,
    cached: Mutex<Option<CachedResolution>>,
}

impl ConfigurationResolver {
    /// Resolver consulting `tokens` for stapled documents and `remote` for
    /// the `mainServer` section, fetching through `client`.
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        remote: Arc<RemoteConfigCache>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            tokens,
            remote,
            client,
            cached: Mutex::new(None),
        }
    }

    fn cached_for(&self, api_url: &str) -> Option<ConnectionConfig> {
        self.cached
            .lock()
            .as_ref()
            .filter(|c| c.resolved_for_endpoint == api_url)
            .map(|c| c.config.clone())
    }

    async fn default_for(&self, server: &ServerIdentity) -> ConnectionConfig {
        let synthesized = ConnectionConfig::synthesized_for(&server.api_url);
        match main_server_section(&self.remote).await {
            Some(section) if section.config.has_hub_url() => {
                debug!(hub_url = %section.config.hub_url, "using mainServer section as default");
                merge(section.config, &synthesized)
            }
            _ => synthesized,
        }
    }

    async fn discovery_document(
        &self,
        server: &ServerIdentity,
        default: &ConnectionConfig,
    ) -> Result<String, DiscoveryError> {
        if let Some(stapled) = self.tokens.get_stapled_well_known(&server.api_url) {
            debug!(api_url = %server.api_url, "using stapled discovery document");
            return Ok(stapled);
        }
        let url = well_known_url(&default.hub_url)?;
        fetch_well_known(&self.client, &url).await
    }
}

#[async_trait]
impl ResolveConfig for ConfigurationResolver {
    #[tracing::instrument(skip_all, fields(server = %server.name, api_url = %server.api_url))]
    async fn resolve(&self, server: &ServerIdentity) -> ConnectionConfig {
        if let Some(config) = self.cached_for(&server.api_url) {
            debug!("resolution cache hit");
            return config;
        }

        let default = self.default_for(server).await;

        let parsed = self
            .discovery_document(server, &default)
            .await
            .and_then(|body| Ok(serde_json::from_str::<ConnectionConfig>(&body)?));
        let discovered = match parsed {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, hub_url = %default.hub_url, "discovery unavailable, using default");
                return default;
            }
        };

        let config = merge(discovered, &default);
        info!(hub_url = %config.hub_url, transports = %config.transports, "resolved connection config");
        *self.cached.lock() = Some(CachedResolution {
            config: config.clone(),
            resolved_for_endpoint: server.api_url.clone(),
        });
        config
    }

    fn invalidate(&self) {
        *self.cached.lock() = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
