//! Transports.
//!
//! Every transport is bridged onto a pair of channels by a background task:
//! frames pushed into [`TransportChannels::outbound`] go to the server, and
//! frames from the server arrive on [`TransportChannels::inbound`]. The
//! inbound channel ending means the server closed cleanly; an `Err` item means
//! the connection failed. Dropping the outbound sender closes the connection.

pub mod long_polling;
pub mod negotiate;
pub mod sse;
pub mod websocket;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tether_core::TransportKind;
use tokio::sync::mpsc;
use url::Url;

use crate::errors::TransportError;

pub use negotiate::{AvailableTransport, NegotiateResponse};

/// Capacity of the per-connection frame channels.
pub const CHANNEL_CAPACITY: usize = 64;

/// Inbound frame or connection failure.
pub type InboundFrame = Result<Bytes, TransportError>;

/// The client side of a connected transport.
#[derive(Debug)]
pub struct TransportChannels {
    /// Frames to send.
    pub outbound: mpsc::Sender<Bytes>,
    /// Frames received.
    pub inbound: mpsc::Receiver<InboundFrame>,
}

/// Server-side ends of a [`TransportChannels`] pair, owned by the bridging task.
#[derive(Debug)]
pub struct TransportTask {
    /// Frames the client wants sent.
    pub outbound: mpsc::Receiver<Bytes>,
    /// Where received frames go.
    pub inbound: mpsc::Sender<InboundFrame>,
}

/// Create a connected channel pair.
pub fn channel_pair() -> (TransportChannels, TransportTask) {
    let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        TransportChannels {
            outbound: out_tx,
            inbound: in_rx,
        },
        TransportTask {
            outbound: out_rx,
            inbound: in_tx,
        },
    )
}

/// Negotiates and opens transports for a hub.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// `POST {hub}/negotiate?negotiateVersion=1`.
    async fn negotiate(&self, url: &str, token: &str) -> Result<NegotiateResponse, TransportError>;

    /// Open `kind` against `url`.
    async fn connect(
        &self,
        kind: TransportKind,
        url: &str,
        token: &str,
    ) -> Result<TransportChannels, TransportError>;
}

/// Default connector over `reqwest` and `tokio-tungstenite`.
#[derive(Clone, Debug)]
pub struct HttpTransportConnector {
    client: reqwest::Client,
    poll_timeout: Duration,
}

impl HttpTransportConnector {
    /// Connector using `client` for negotiate, SSE and long polling.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            poll_timeout: long_polling::DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the long-poll request timeout.
    #[must_use]
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

#[async_trait]
impl TransportConnector for HttpTransportConnector {
    async fn negotiate(&self, url: &str, token: &str) -> Result<NegotiateResponse, TransportError> {
        negotiate::negotiate(&self.client, url, token).await
    }

    async fn connect(
        &self,
        kind: TransportKind,
        url: &str,
        token: &str,
    ) -> Result<TransportChannels, TransportError> {
        match kind {
            TransportKind::WebSockets => websocket::connect(url, token).await,
            TransportKind::ServerSentEvents => sse::connect(&self.client, url, token).await,
            TransportKind::LongPolling => {
                long_polling::connect(&self.client, url, token, self.poll_timeout).await
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// URL helpers
// ─────────────────────────────────────────────────────────────────────────────

/// `url` with `ws`/`wss` mapped to `http`/`https`.
pub fn http_url(url: &str) -> Result<Url, TransportError> {
    with_scheme(url, |scheme| match scheme {
        "ws" | "http" => Some("http"),
        "wss" | "https" => Some("https"),
        _ => None,
    })
}

/// `url` with `http`/`https` mapped to `ws`/`wss`.
pub fn ws_url(url: &str) -> Result<Url, TransportError> {
    with_scheme(url, |scheme| match scheme {
        "ws" | "http" => Some("ws"),
        "wss" | "https" => Some("wss"),
        _ => None,
    })
}

fn with_scheme(url: &str, map: impl Fn(&str) -> Option<&'static str>) -> Result<Url, TransportError> {
    let invalid = || TransportError::InvalidUrl(url.to_string());
    let mut parsed = Url::parse(url).map_err(|_| invalid())?;
    let scheme = map(parsed.scheme()).ok_or_else(invalid)?;
    if parsed.scheme() != scheme {
        // Switching between special schemes always succeeds.
        parsed.set_scheme(scheme).map_err(|()| invalid())?;
    }
    Ok(parsed)
}

/// `{url}?id={connection_token}`, keeping any existing query.
pub fn connect_url(url: &str, connection_token: Option<&str>) -> Result<String, TransportError> {
    let mut parsed = Url::parse(url).map_err(|_| TransportError::InvalidUrl(url.to_string()))?;
    if let Some(id) = connection_token {
        let _ = parsed.query_pairs_mut().append_pair("id", id);
    }
    Ok(parsed.into())
}
