//! Token providers.
//!
//! The connection layer never holds a token. It asks a [`TokenProvider`] on
//! every connect and reconnect attempt, so a provider is free to refresh.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::AuthError;
use crate::storage::{load_auth_storage, save_auth_storage};
use crate::types::{AuthStorage, calculate_expires_at, now_ms, should_refresh};

/// Source of bearer credentials and issuer-stapled discovery documents.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently valid bearer token, refreshing it if needed.
    async fn get_or_update_token(&self, cancel: &CancellationToken) -> Result<String, AuthError>;

    /// Discovery document the issuer stapled for `endpoint`, if any.
    fn get_stapled_well_known(&self, endpoint: &str) -> Option<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Static
// ─────────────────────────────────────────────────────────────────────────────

/// Provider returning a fixed token. Used by the CLI `--token` flag and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenProvider {
    token: String,
    stapled: Option<(String, String)>,
}

impl StaticTokenProvider {
    /// Provider for `token` with nothing stapled.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            stapled: None,
        }
    }

    /// Staple `document` for `endpoint`.
    #[must_use]
    pub fn with_stapled(mut self, endpoint: impl Into<String>, document: impl Into<String>) -> Self {
        self.stapled = Some((endpoint.into(), document.into()));
        self
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_or_update_token(&self, cancel: &CancellationToken) -> Result<String, AuthError> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        Ok(self.token.clone())
    }

    fn get_stapled_well_known(&self, endpoint: &str) -> Option<String> {
        self.stapled
            .as_ref()
            .filter(|(ep, _)| ep == endpoint)
            .map(|(_, doc)| doc.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stored
// ─────────────────────────────────────────────────────────────────────────────

/// Provider backed by `auth.json`, refreshing expired tokens against the
/// stored token endpoint and persisting the result.
pub struct StoredTokenProvider {
    path: PathBuf,
    client: reqwest::Client,
    cached: Mutex<Option<AuthStorage>>,
}

impl StoredTokenProvider {
    /// Provider reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_client(path, reqwest::Client::new())
    }

    /// Provider reading `path`, refreshing through `client`.
    pub fn with_client(path: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            path: path.into(),
            client,
            cached: Mutex::new(None),
        }
    }

    /// Path of the backing auth file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn current_token(&self) -> Result<String, AuthError> {
        // Held across the refresh so concurrent callers share one request.
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = load_auth_storage(&self.path);
        }
        let Some(storage) = cached.as_mut() else {
            return Err(AuthError::NotConfigured(self.path.display().to_string()));
        };
        if !storage.has_token() {
            return Err(AuthError::NotConfigured(self.path.display().to_string()));
        }
        if !should_refresh(storage.expires_at, now_ms()) {
            return Ok(storage.access_token.clone());
        }

        let (Some(refresh), Some(url)) = (storage.refresh_token.clone(), storage.token_url.clone())
        else {
            return Err(AuthError::TokenExpired("no refresh token stored".into()));
        };

        info!("access token expired, refreshing");
        let fresh = refresh_token(&self.client, &url, &refresh).await?;
        storage.access_token = fresh.access_token;
        if let Some(rotated) = fresh.refresh_token {
            storage.refresh_token = Some(rotated);
        }
        storage.expires_at = calculate_expires_at(fresh.expires_in);
        if let Err(e) = save_auth_storage(&self.path, storage) {
            tracing::warn!(error = %e, "failed to persist refreshed token");
        }
        Ok(storage.access_token.clone())
    }
}

#[async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn get_or_update_token(&self, cancel: &CancellationToken) -> Result<String, AuthError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AuthError::Cancelled),
            token = self.current_token() => token,
        }
    }

    fn get_stapled_well_known(&self, endpoint: &str) -> Option<String> {
        let doc = load_auth_storage(&self.path)?.stapled_for(endpoint);
        if doc.is_some() {
            debug!(endpoint, "using stapled discovery document");
        }
        doc
    }
}

/// Token endpoint response.
#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Exchange a refresh token for a new access token.
#[tracing::instrument(skip_all)]
async fn refresh_token(
    client: &reqwest::Client,
    token_url: &str,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let body = serde_json::json!({
        "grant_type": "refresh_token",
        "refresh_token": refresh_token,
    });

    let resp = client.post(token_url).json(&body).send().await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::Refresh {
            status,
            message: text,
        });
    }

    Ok(resp.json().await?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
