//! Duplex hub connection.
//!
//! A [`HubConnection`] owns one logical session with a hub. [`HubConnection::start`]
//! performs the initial connect (negotiate, transport, handshake) and then hands
//! the transport to a supervisor task. The supervisor decodes inbound frames
//! into [`rmpv::Value`]s for [`HubConnection::messages`] subscribers and, when
//! the transport drops, reconnects forever on the schedule of the injected
//! [`ReconnectPolicy`] until [`HubConnection::stop`] is called.
//!
//! Lifecycle signals:
//! - `reconnecting(error)` once per drop, before the first retry
//! - `reconnected(connection_id)` once the retry loop succeeds
//! - `closed(None)` when the supervisor exits after a stop

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tether_auth::{AuthError, TokenProvider};
use tether_core::{ReconnectPolicy, TransportKind, TransportSet};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::MessagePackCodec;
use crate::errors::{ClientError, TransportError};
use crate::handshake::{handshake_request, parse_handshake_response};
use crate::signals::{LifecycleSignals, Subscription};
use crate::transport::{InboundFrame, TransportChannels, TransportConnector, connect_url};

/// Negotiate redirects followed before giving up.
pub const MAX_NEGOTIATE_REDIRECTS: usize = 100;

/// Capacity of the decoded message broadcast.
pub const MESSAGE_CAPACITY: usize = 256;

/// Observable state of a [`HubConnection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HubState {
    /// Not started, or stopped.
    Disconnected,
    /// Initial connect in progress.
    Connecting,
    /// Transport up and handshake complete.
    Connected,
    /// Transport dropped; the supervisor is retrying.
    Reconnecting,
}

/// Parameters of a hub connection.
#[derive(Clone, Debug)]
pub struct HubOptions {
    /// Hub endpoint.
    pub hub_url: String,
    /// Transports to offer, most capable first.
    pub transports: TransportSet,
    /// Connect straight over WebSockets without negotiating.
    pub skip_negotiation: bool,
    /// Deflate-compress message frames.
    pub compress: bool,
    /// Bound on the handshake round-trip.
    pub handshake_timeout: Duration,
    /// Bound on waiting for the supervisor during [`HubConnection::stop`].
    pub stop_timeout: Duration,
}

impl HubOptions {
    /// Options for `hub_url` offering every transport.
    pub fn new(hub_url: impl Into<String>) -> Self {
        Self {
            hub_url: hub_url.into(),
            transports: TransportSet::all(),
            skip_negotiation: false,
            compress: false,
            handshake_timeout: Duration::from_secs(15),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// A connected transport after a successful handshake.
struct Live {
    kind: TransportKind,
    connection_id: Option<String>,
    outbound: mpsc::Sender<Bytes>,
    inbound: mpsc::Receiver<InboundFrame>,
    buffer: BytesMut,
}

enum Ended {
    Cancelled,
    Lost(Option<String>),
}

struct HubInner {
    options: HubOptions,
    codec: MessagePackCodec,
    tokens: Arc<dyn TokenProvider>,
    connector: Arc<dyn TransportConnector>,
    policy: Arc<dyn ReconnectPolicy>,
    shutdown: CancellationToken,
    state: RwLock<HubState>,
    connection_id: RwLock<Option<String>>,
    outbound: RwLock<Option<mpsc::Sender<Bytes>>>,
    messages: broadcast::Sender<rmpv::Value>,
    signals: LifecycleSignals,
}

/// A duplex hub connection with automatic reconnect.
pub struct HubConnection {
    inner: Arc<HubInner>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl HubConnection {
    /// Unstarted connection. `tokens` is asked for a bearer token on every
    /// connect and reconnect attempt.
    pub fn new(
        options: HubOptions,
        tokens: Arc<dyn TokenProvider>,
        connector: Arc<dyn TransportConnector>,
        policy: Arc<dyn ReconnectPolicy>,
    ) -> Self {
        let (messages, _) = broadcast::channel(MESSAGE_CAPACITY);
        Self {
            inner: Arc::new(HubInner {
                codec: MessagePackCodec::new(options.compress),
                options,
                tokens,
                connector,
                policy,
                shutdown: CancellationToken::new(),
                state: RwLock::new(HubState::Disconnected),
                connection_id: RwLock::new(None),
                outbound: RwLock::new(None),
                messages,
                signals: LifecycleSignals::default(),
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Connect and start the supervisor.
    ///
    /// Fails with [`ClientError::InvalidState`] unless disconnected, and with
    /// [`ClientError::Cancelled`] if `cancel` fires or the connection is
    /// stopped first.
    #[tracing::instrument(skip_all, fields(hub_url = %self.inner.options.hub_url))]
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        {
            let mut state = self.inner.state.write();
            if *state != HubState::Disconnected {
                return Err(ClientError::InvalidState(*state));
            }
            if self.inner.shutdown.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            *state = HubState::Connecting;
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClientError::Cancelled),
            () = self.inner.shutdown.cancelled() => Err(ClientError::Cancelled),
            result = self.inner.connect_once(cancel) => result,
        };
        let live = match result {
            Ok(live) => live,
            Err(e) => {
                *self.inner.state.write() = HubState::Disconnected;
                return Err(e);
            }
        };

        self.inner.install(&live);
        let task = tokio::spawn(Arc::clone(&self.inner).supervise(live));
        *self.supervisor.lock() = Some(task);
        Ok(())
    }

    /// Stop the connection: cancel the supervisor and wait for it, up to the
    /// configured stop timeout. A stopped connection cannot be restarted.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        let task = self.supervisor.lock().take();
        let Some(mut task) = task else {
            return;
        };
        if tokio::time::timeout(self.inner.options.stop_timeout, &mut task)
            .await
            .is_err()
        {
            warn!(
                timeout = ?self.inner.options.stop_timeout,
                "supervisor did not stop in time, aborting"
            );
            task.abort();
        }
    }

    /// Encode `message` and queue it for sending.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ClientError> {
        let frame = self.inner.codec.encode(message)?;
        let outbound = self
            .inner
            .outbound
            .read()
            .clone()
            .ok_or_else(|| ClientError::InvalidState(self.state()))?;
        outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::ConnectionLost("transport closed".into()))?;
        Ok(())
    }

    /// Subscribe to decoded inbound messages.
    pub fn messages(&self) -> broadcast::Receiver<rmpv::Value> {
        self.inner.messages.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> HubState {
        *self.inner.state.read()
    }

    /// Server-assigned id of the current connection.
    pub fn connection_id(&self) -> Option<String> {
        self.inner.connection_id.read().clone()
    }

    /// Call `handler` when the connection stops for good.
    pub fn on_closed(&self, handler: impl Fn(&Option<String>) + Send + Sync + 'static) -> Subscription {
        self.inner.signals.closed.subscribe(handler)
    }

    /// Call `handler` when the transport drops and reconnection begins.
    pub fn on_reconnecting(
        &self,
        handler: impl Fn(&Option<String>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.signals.reconnecting.subscribe(handler)
    }

    /// Call `handler` with the new connection id after a successful reconnect.
    pub fn on_reconnected(
        &self,
        handler: impl Fn(&Option<String>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.signals.reconnected.subscribe(handler)
    }
}

impl std::fmt::Debug for HubConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConnection")
            .field("hub_url", &self.inner.options.hub_url)
            .field("state", &self.state())
            .field("connection_id", &self.connection_id())
            .finish_non_exhaustive()
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connect
// ─────────────────────────────────────────────────────────────────────────────

impl HubInner {
    async fn token(&self, cancel: &CancellationToken) -> Result<String, ClientError> {
        self.tokens
            .get_or_update_token(cancel)
            .await
            .map_err(|e| match e {
                AuthError::Cancelled => ClientError::Cancelled,
                other => ClientError::Auth(other),
            })
    }

    /// Negotiate (unless skipped), open the transport and complete the handshake.
    async fn connect_once(&self, cancel: &CancellationToken) -> Result<Live, ClientError> {
        let mut token = self.token(cancel).await?;
        let mut url = self.options.hub_url.clone();

        let (kind, connect_token, connection_id) = if self.options.skip_negotiation {
            (TransportKind::WebSockets, None, None)
        } else {
            let mut redirects = 0;
            loop {
                let resp = self.connector.negotiate(&url, &token).await?;
                if let Some(error) = resp.error.as_deref() {
                    return Err(ClientError::Negotiate(error.to_string()));
                }
                if let Some(target) = resp.redirect() {
                    redirects += 1;
                    if redirects > MAX_NEGOTIATE_REDIRECTS {
                        return Err(ClientError::Negotiate("too many negotiate redirects".into()));
                    }
                    debug!(redirect = %target, "negotiate redirect");
                    url = target.to_string();
                    if let Some(access_token) = resp.access_token {
                        token = access_token;
                    }
                    continue;
                }
                let kind = resp
                    .pick_transport(self.options.transports)
                    .ok_or(ClientError::NoSupportedTransport)?;
                break (
                    kind,
                    resp.connect_id().map(str::to_string),
                    resp.connection_id.clone(),
                );
            }
        };

        let target = connect_url(&url, connect_token.as_deref())?;
        let TransportChannels { outbound, mut inbound } =
            self.connector.connect(kind, &target, &token).await?;

        outbound
            .send(handshake_request())
            .await
            .map_err(|_| TransportError::ConnectionLost("closed before handshake".into()))?;

        let mut buffer = BytesMut::new();
        let handshake = async {
            while !parse_handshake_response(&mut buffer)? {
                match inbound.recv().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => return Err(ClientError::Transport(e)),
                    None => {
                        return Err(ClientError::Handshake(
                            "connection closed during handshake".into(),
                        ));
                    }
                }
            }
            Ok(())
        };
        tokio::time::timeout(self.options.handshake_timeout, handshake)
            .await
            .map_err(|_| ClientError::Handshake("timed out waiting for handshake response".into()))??;

        info!(transport = %kind, connection_id = ?connection_id, "hub connected");
        Ok(Live {
            kind,
            connection_id,
            outbound,
            inbound,
            buffer,
        })
    }

    fn install(&self, live: &Live) {
        *self.outbound.write() = Some(live.outbound.clone());
        *self.connection_id.write() = live.connection_id.clone();
        *self.state.write() = HubState::Connected;
    }

    fn detach(&self) {
        *self.outbound.write() = None;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Supervisor
    // ─────────────────────────────────────────────────────────────────────────

    async fn supervise(self: Arc<Self>, initial: Live) {
        let cancel = self.shutdown.clone();
        let mut live = initial;
        loop {
            let ended = self.pump(&mut live, &cancel).await;
            self.detach();
            let transport = live.kind;
            drop(live);

            let error = match ended {
                Ended::Cancelled => break,
                Ended::Lost(error) => error,
            };
            warn!(%transport, error = ?error, "connection lost, reconnecting");
            *self.state.write() = HubState::Reconnecting;
            self.signals.reconnecting.fire(&error);

            match self.reconnect(&cancel).await {
                Some(next) => {
                    self.install(&next);
                    self.signals.reconnected.fire(&next.connection_id);
                    live = next;
                }
                None => break,
            }
        }

        *self.state.write() = HubState::Disconnected;
        *self.connection_id.write() = None;
        debug!("supervisor stopped");
        self.signals.closed.fire(&None);
    }

    /// Decode inbound frames until the transport ends or `cancel` fires.
    async fn pump(&self, live: &mut Live, cancel: &CancellationToken) -> Ended {
        let mut codec = self.codec;
        loop {
            loop {
                match codec.decode(&mut live.buffer) {
                    Ok(Some(message)) => {
                        let _ = self.messages.send(message);
                    }
                    Ok(None) => break,
                    Err(e) => return Ended::Lost(Some(e.to_string())),
                }
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ended::Cancelled,
                frame = live.inbound.recv() => match frame {
                    Some(Ok(chunk)) => live.buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => return Ended::Lost(Some(e.to_string())),
                    None => return Ended::Lost(None),
                },
            }
        }
    }

    /// Retry until connected. `None` once cancelled.
    async fn reconnect(&self, cancel: &CancellationToken) -> Option<Live> {
        let mut attempts: u32 = 0;
        loop {
            let delay = self.policy.next_delay(attempts);
            if !delay.is_zero() {
                debug!(attempt = attempts + 1, ?delay, "waiting to reconnect");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return None,
                    () = tokio::time::sleep(delay) => {}
                }
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                result = self.connect_once(cancel) => result,
            };
            match result {
                Ok(live) => return Some(live),
                Err(ClientError::Cancelled) => return None,
                Err(e) => {
                    attempts = attempts.saturating_add(1);
                    warn!(attempts, error = %e, "reconnect attempt failed");
                }
            }
        }
    }
}
