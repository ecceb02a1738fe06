//! Connection factory and lifecycle manager.
//!
//! [`ConnectionManager`] owns at most one live [`ConnectionHandle`]. The slot
//! moves None → Live → Disposed, and a disposed slot collapses back to None on
//! the next [`ConnectionManager::get_or_create`]. Both operations run behind a
//! single async mutex, so concurrent callers share one build and one teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tether_auth::TokenProvider;
use tether_core::platform::is_platform_restricted;
use tether_core::{ConnectionConfig, ReconnectPolicy, ServerIdentity, TransportSet};
use tether_discovery::{ResolveConfig, main_server_section};
use tether_events::{EventBus, LifecycleEvent};
use tether_remote_config::RemoteConfigCache;
use tether_settings::TetherSettings;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::ClientError;
use crate::hub::{HubConnection, HubOptions, HubState};
use crate::negotiator::{TransportPreferences, plan};
use crate::signals::Subscription;
use crate::transport::TransportConnector;

/// Connection parameters taken from settings.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Server to connect to.
    pub server: ServerIdentity,
    /// Local transport preferences.
    pub preferences: TransportPreferences,
    /// Keep WebSockets on restricted platforms.
    pub force_full_transport: bool,
    /// Deflate-compress message frames.
    pub compress: bool,
    /// Bound on the protocol handshake.
    pub handshake_timeout: Duration,
    /// Bound on a graceful stop.
    pub stop_timeout: Duration,
}

impl ClientOptions {
    /// Options for `settings`. An unset platform restriction is auto-detected.
    pub fn from_settings(settings: &TetherSettings) -> Self {
        Self {
            server: settings.server_identity(),
            preferences: TransportPreferences {
                preferred: settings.transport.preferred,
                allow_fallback: settings.transport.allow_fallback,
                platform_restricted: settings
                    .transport
                    .platform_restricted
                    .unwrap_or_else(is_platform_restricted),
            },
            force_full_transport: settings.transport.force_full_transport,
            compress: settings.connection.compress,
            handshake_timeout: Duration::from_millis(settings.connection.handshake_timeout_ms),
            stop_timeout: Duration::from_millis(settings.connection.stop_timeout_ms),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// The live connection. Only the manager can dispose it.
pub struct ConnectionHandle {
    hub: HubConnection,
    config: ConnectionConfig,
    transports: TransportSet,
    disposed: AtomicBool,
}

impl ConnectionHandle {
    /// Perform the initial connect.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        self.hub.start(cancel).await
    }

    /// Encode and send a message.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ClientError> {
        self.hub.send(message).await
    }

    /// Subscribe to decoded inbound messages.
    pub fn messages(&self) -> broadcast::Receiver<rmpv::Value> {
        self.hub.messages()
    }

    /// Current connection state.
    pub fn state(&self) -> HubState {
        self.hub.state()
    }

    /// Server-assigned id of the current connection.
    pub fn connection_id(&self) -> Option<String> {
        self.hub.connection_id()
    }

    /// The resolved configuration this connection was built from.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The negotiated transport set offered to the server.
    pub fn transports(&self) -> TransportSet {
        self.transports
    }

    /// Whether the manager has disposed this connection.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("hub", &self.hub)
            .field("transports", &self.transports)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct Live {
    handle: Arc<ConnectionHandle>,
    subscriptions: Vec<Subscription>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Builds, hands out and disposes the single live connection.
pub struct ConnectionManager {
    server: RwLock<ServerIdentity>,
    options: ClientOptions,
    resolver: Arc<dyn ResolveConfig>,
    remote: Arc<RemoteConfigCache>,
    tokens: Arc<dyn TokenProvider>,
    events: Arc<dyn EventBus>,
    connector: Arc<dyn TransportConnector>,
    policy: Arc<dyn ReconnectPolicy>,
    slot: Mutex<Option<Live>>,
}

impl ConnectionManager {
    /// Manager for `options.server`.
    pub fn new(
        options: ClientOptions,
        resolver: Arc<dyn ResolveConfig>,
        remote: Arc<RemoteConfigCache>,
        tokens: Arc<dyn TokenProvider>,
        events: Arc<dyn EventBus>,
        connector: Arc<dyn TransportConnector>,
        policy: Arc<dyn ReconnectPolicy>,
    ) -> Self {
        Self {
            server: RwLock::new(options.server.clone()),
            options,
            resolver,
            remote,
            tokens,
            events,
            connector,
            policy,
            slot: Mutex::new(None),
        }
    }

    /// The server new connections are built for.
    pub fn server(&self) -> ServerIdentity {
        self.server.read().clone()
    }

    /// Return the live connection, building one if there is none.
    ///
    /// A live handle is returned as the same `Arc` without resolving again.
    /// The returned handle is not started.
    #[tracing::instrument(skip_all)]
    pub async fn get_or_create(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<ConnectionHandle>, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let mut slot = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ClientError::Cancelled),
            slot = self.slot.lock() => slot,
        };

        if let Some(live) = slot.as_ref() {
            if !live.handle.is_disposed() {
                debug!("reusing live connection");
                return Ok(Arc::clone(&live.handle));
            }
        }
        *slot = None;

        let server = self.server();
        let config = self.resolver.resolve(&server).await;
        let force_full_transport = self.options.force_full_transport
            || main_server_section(&self.remote)
                .await
                .is_some_and(|section| section.force_full_transport);
        let plan = plan(&config, &self.options.preferences, force_full_transport);
        info!(
            server = %server.name,
            hub_url = %config.hub_url,
            transports = %plan.transports,
            skip_negotiation = plan.skip_negotiation,
            "building connection"
        );

        let hub = HubConnection::new(
            HubOptions {
                hub_url: config.hub_url.clone(),
                transports: plan.transports,
                skip_negotiation: plan.skip_negotiation,
                compress: self.options.compress,
                handshake_timeout: self.options.handshake_timeout,
                stop_timeout: self.options.stop_timeout,
            },
            Arc::clone(&self.tokens),
            Arc::clone(&self.connector),
            Arc::clone(&self.policy),
        );
        let subscriptions = self.attach(&hub);
        let handle = Arc::new(ConnectionHandle {
            hub,
            config,
            transports: plan.transports,
            disposed: AtomicBool::new(false),
        });
        *slot = Some(Live {
            handle: Arc::clone(&handle),
            subscriptions,
        });
        Ok(handle)
    }

    /// Tear down the live connection. Returns `false` if there was none.
    ///
    /// The signal subscriptions are released before the transport stops, so
    /// the stop's own `closed` signal never reaches the event bus.
    pub async fn dispose(&self) -> bool {
        let mut slot = self.slot.lock().await;
        let Some(mut live) = slot.take() else {
            return false;
        };
        if live.handle.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        for subscription in &mut live.subscriptions {
            subscription.release();
        }
        live.handle.hub.stop().await;
        info!("connection disposed");
        true
    }

    /// Point the manager at another server: dispose the live connection and
    /// drop the cached resolution.
    pub async fn switch_server(&self, server: ServerIdentity) {
        let _ = self.dispose().await;
        self.resolver.invalidate();
        info!(server = %server.name, api_url = %server.api_url, "switched server");
        *self.server.write() = server;
    }

    fn attach(&self, hub: &HubConnection) -> Vec<Subscription> {
        let closed = Arc::clone(&self.events);
        let reconnecting = Arc::clone(&self.events);
        let reconnected = Arc::clone(&self.events);
        vec![
            hub.on_closed(move |error| {
                closed.publish(LifecycleEvent::Closed {
                    error: error.clone(),
                });
            }),
            hub.on_reconnecting(move |error| {
                reconnecting.publish(LifecycleEvent::Reconnecting {
                    error: error.clone(),
                });
            }),
            hub.on_reconnected(move |connection_id| {
                reconnected.publish(LifecycleEvent::Reconnected {
                    connection_id: connection_id.clone(),
                });
            }),
        ]
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("server", &*self.server.read())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
