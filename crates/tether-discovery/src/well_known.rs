//! Well-known discovery endpoint derivation and fetch.

use tether_core::constants::WELL_KNOWN_PATH;
use tracing::debug;
use url::Url;

use crate::errors::DiscoveryError;

/// Media type a discovery response must carry.
const JSON_MEDIA_TYPE: &str = "application/json";

/// Derive `{http|https}://{host[:port]}/.well-known/tether/client` from a hub URL.
///
/// `ws` maps to `http` and `wss` to `https`. Path, query and credentials of
/// the hub URL are dropped.
pub fn well_known_url(hub_url: &str) -> Result<Url, DiscoveryError> {
    let invalid = || DiscoveryError::InvalidUrl(hub_url.to_string());
    let parsed = Url::parse(hub_url).map_err(|_| invalid())?;
    let scheme = match parsed.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        _ => return Err(invalid()),
    };
    let host = parsed.host_str().ok_or_else(invalid)?;
    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Url::parse(&format!("{scheme}://{authority}{WELL_KNOWN_PATH}")).map_err(|_| invalid())
}

/// Whether a `Content-Type` header value names exactly `application/json`.
/// Parameters such as `charset` are ignored.
pub fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim() == JSON_MEDIA_TYPE)
}

/// Fetch the discovery document body. One attempt, no retry.
#[tracing::instrument(skip(client), fields(url = %url))]
pub async fn fetch_well_known(client: &reqwest::Client, url: &Url) -> Result<String, DiscoveryError> {
    let resp = client.get(url.clone()).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status(status.as_u16()));
    }
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !is_json_content_type(&content_type) {
        return Err(DiscoveryError::ContentType(content_type));
    }
    let body = resp.text().await?;
    debug!(bytes = body.len(), "discovery document fetched");
    Ok(body)
}
