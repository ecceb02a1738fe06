//! In-process fakes for connection tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tether_auth::{AuthError, TokenProvider};
use tether_core::{ConnectionConfig, ServerIdentity, TransportKind};
use tether_discovery::ResolveConfig;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::TransportError;
use crate::transport::{
    AvailableTransport, InboundFrame, NegotiateResponse, TransportChannels, TransportConnector,
    TransportTask, channel_pair,
};

/// How the fake server answers the handshake.
#[derive(Clone, Copy, Debug)]
pub(crate) enum HandshakeReply {
    Accept,
    Error(&'static str),
    Silent,
}

/// Connector whose "server" lives in a spawned task: it answers the handshake
/// and echoes every later frame.
pub(crate) struct FakeConnector {
    offered: Vec<AvailableTransport>,
    refusal: Option<String>,
    redirects: Mutex<usize>,
    redirect_to: (String, String),
    reply: HandshakeReply,
    negotiations: AtomicUsize,
    connects: AtomicUsize,
    fail_connects: Mutex<usize>,
    connect_urls: Mutex<Vec<String>>,
    tokens: Mutex<Vec<String>>,
    kinds: Mutex<Vec<TransportKind>>,
    live: Mutex<Vec<(mpsc::Sender<InboundFrame>, CancellationToken)>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self {
            offered: Vec::new(),
            refusal: None,
            redirects: Mutex::new(0),
            redirect_to: (String::new(), String::new()),
            reply: HandshakeReply::Accept,
            negotiations: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            fail_connects: Mutex::new(0),
            connect_urls: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            kinds: Mutex::new(Vec::new()),
            live: Mutex::new(Vec::new()),
        }
        .offering(&["WebSockets", "ServerSentEvents", "LongPolling"])
    }

    pub(crate) fn offering(mut self, transports: &[&str]) -> Self {
        self.offered = transports
            .iter()
            .map(|t| AvailableTransport {
                transport: (*t).to_string(),
                transfer_formats: vec!["Text".into(), "Binary".into()],
            })
            .collect();
        self
    }

    pub(crate) fn refusing(mut self, error: &str) -> Self {
        self.refusal = Some(error.to_string());
        self
    }

    pub(crate) fn redirecting(mut self, times: usize, url: &str, access_token: &str) -> Self {
        self.redirects = Mutex::new(times);
        self.redirect_to = (url.to_string(), access_token.to_string());
        self
    }

    pub(crate) fn replying(mut self, reply: HandshakeReply) -> Self {
        self.reply = reply;
        self
    }

    pub(crate) fn fail_next_connects(&self, n: usize) {
        *self.fail_connects.lock() = n;
    }

    pub(crate) fn negotiations(&self) -> usize {
        self.negotiations.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn connect_urls(&self) -> Vec<String> {
        self.connect_urls.lock().clone()
    }

    pub(crate) fn tokens_seen(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }

    pub(crate) fn connected_kinds(&self) -> Vec<TransportKind> {
        self.kinds.lock().clone()
    }

    /// Fail the most recent connection with a transport error.
    pub(crate) async fn break_latest(&self, reason: &str) {
        let latest = self.live.lock().pop();
        if let Some((inbound, stop)) = latest {
            let _ = inbound
                .send(Err(TransportError::ConnectionLost(reason.to_string())))
                .await;
            stop.cancel();
        }
    }

    /// Close the most recent connection cleanly from the server side.
    pub(crate) fn close_latest(&self) {
        if let Some((_, stop)) = self.live.lock().pop() {
            stop.cancel();
        }
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn negotiate(&self, _url: &str, _token: &str) -> Result<NegotiateResponse, TransportError> {
        let n = self.negotiations.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(error) = &self.refusal {
            return Ok(NegotiateResponse {
                error: Some(error.clone()),
                ..NegotiateResponse::default()
            });
        }
        {
            let mut redirects = self.redirects.lock();
            if *redirects > 0 {
                *redirects -= 1;
                return Ok(NegotiateResponse {
                    url: Some(self.redirect_to.0.clone()),
                    access_token: Some(self.redirect_to.1.clone()),
                    ..NegotiateResponse::default()
                });
            }
        }
        Ok(NegotiateResponse {
            connection_id: Some(format!("conn-{n}")),
            connection_token: Some(format!("token-{n}")),
            negotiate_version: 1,
            available_transports: self.offered.clone(),
            ..NegotiateResponse::default()
        })
    }

    async fn connect(
        &self,
        kind: TransportKind,
        url: &str,
        token: &str,
    ) -> Result<TransportChannels, TransportError> {
        let _ = self.connects.fetch_add(1, Ordering::SeqCst);
        {
            let mut fail = self.fail_connects.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(TransportError::ConnectionLost("connection refused".into()));
            }
        }
        self.connect_urls.lock().push(url.to_string());
        self.tokens.lock().push(token.to_string());
        self.kinds.lock().push(kind);

        let (channels, task) = channel_pair();
        let stop = CancellationToken::new();
        self.live.lock().push((task.inbound.clone(), stop.clone()));
        let _server = tokio::spawn(respond(task, self.reply, stop));
        Ok(channels)
    }
}

async fn respond(mut task: TransportTask, reply: HandshakeReply, stop: CancellationToken) {
    let mut handshaken = false;
    loop {
        let frame = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            frame = task.outbound.recv() => frame,
        };
        let Some(frame) = frame else { break };
        if handshaken {
            let _ = task.inbound.send(Ok(frame)).await;
            continue;
        }
        handshaken = true;
        let response = match reply {
            HandshakeReply::Accept => Bytes::from_static(b"{}\x1e"),
            HandshakeReply::Error(msg) => Bytes::from(format!("{{\"error\":\"{msg}\"}}\x1e")),
            HandshakeReply::Silent => continue,
        };
        let _ = task.inbound.send(Ok(response)).await;
    }
}

/// Resolver returning a fixed config and counting calls.
pub(crate) struct CountingResolver {
    config: ConnectionConfig,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub(crate) fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResolveConfig for CountingResolver {
    async fn resolve(&self, _server: &ServerIdentity) -> ConnectionConfig {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        self.config.clone()
    }

    fn invalidate(&self) {}
}

/// Token provider issuing `bearer-1`, `bearer-2`, ... one per call.
#[derive(Default)]
pub(crate) struct RotatingTokenProvider {
    issued: AtomicUsize,
}

impl RotatingTokenProvider {
    pub(crate) fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for RotatingTokenProvider {
    async fn get_or_update_token(&self, _cancel: &CancellationToken) -> Result<String, AuthError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("bearer-{n}"))
    }

    fn get_stapled_well_known(&self, _endpoint: &str) -> Option<String> {
        None
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
