//! The negotiate round-trip.

use serde::Deserialize;
use tether_core::{TransportKind, TransportSet};
use tracing::debug;

use super::http_url;
use crate::errors::TransportError;

/// Transfer format every transport must support for the binary protocol.
pub const BINARY_TRANSFER_FORMAT: &str = "Binary";

/// Negotiate protocol version requested by the client.
pub const NEGOTIATE_VERSION: u32 = 1;

/// A transport the server offers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvailableTransport {
    /// Transport name (`WebSockets`, ...).
    pub transport: String,
    /// Supported transfer formats (`Text`, `Binary`).
    pub transfer_formats: Vec<String>,
}

/// Response of `POST {hub}/negotiate`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NegotiateResponse {
    /// Server-assigned connection id.
    pub connection_id: Option<String>,
    /// Token passed as `id` when connecting (version 1).
    pub connection_token: Option<String>,
    /// Negotiate version the server speaks.
    pub negotiate_version: u32,
    /// Offered transports.
    pub available_transports: Vec<AvailableTransport>,
    /// Redirect target hub URL.
    pub url: Option<String>,
    /// Token to use with the redirect target.
    pub access_token: Option<String>,
    /// Server refusal.
    pub error: Option<String>,
}

impl NegotiateResponse {
    /// The `id` query value to connect with.
    pub fn connect_id(&self) -> Option<&str> {
        self.connection_token
            .as_deref()
            .or(self.connection_id.as_deref())
    }

    /// Whether this response redirects to another hub.
    pub fn redirect(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    /// Offered transports that can carry binary frames.
    pub fn binary_transports(&self) -> TransportSet {
        self.available_transports
            .iter()
            .filter(|t| t.transfer_formats.iter().any(|f| f == BINARY_TRANSFER_FORMAT))
            .filter_map(|t| t.transport.parse::<TransportKind>().ok())
            .collect()
    }

    /// First transport in `preferred` order that the server offers with binary
    /// support.
    pub fn pick_transport(&self, preferred: TransportSet) -> Option<TransportKind> {
        let offered = self.binary_transports();
        preferred.iter().find(|kind| offered.contains(*kind))
    }
}

/// `POST {hub}/negotiate?negotiateVersion=1` with bearer auth.
#[tracing::instrument(skip(client, token))]
pub async fn negotiate(
    client: &reqwest::Client,
    hub_url: &str,
    token: &str,
) -> Result<NegotiateResponse, TransportError> {
    let url = negotiate_url(hub_url)?;
    let resp = client.post(url).bearer_auth(token).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }
    let body = resp.bytes().await?;
    let parsed: NegotiateResponse = serde_json::from_slice(&body)
        .map_err(|e| TransportError::Malformed(format!("negotiate response: {e}")))?;
    debug!(
        connection_id = ?parsed.connection_id,
        transports = parsed.available_transports.len(),
        "negotiated"
    );
    Ok(parsed)
}

/// `{hub}/negotiate?negotiateVersion=1` over HTTP(S).
pub fn negotiate_url(hub_url: &str) -> Result<url::Url, TransportError> {
    let mut url = http_url(hub_url)?;
    let _ = url
        .path_segments_mut()
        .map_err(|()| TransportError::InvalidUrl(hub_url.to_string()))?
        .pop_if_empty()
        .push("negotiate");
    let _ = url
        .query_pairs_mut()
        .append_pair("negotiateVersion", &NEGOTIATE_VERSION.to_string());
    Ok(url)
}
