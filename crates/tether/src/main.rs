//! # tether
//!
//! Command-line client. `resolve` prints the connection configuration the
//! factory would use for the configured server; `connect` builds and holds
//! the connection, printing inbound messages and lifecycle events until
//! interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tether_auth::{StaticTokenProvider, StoredTokenProvider, TokenProvider, auth_file_path};
use tether_client::{
    ClientOptions, ConnectionManager, HttpTransportConnector, TransportConnector, plan,
};
use tether_discovery::{ConfigurationResolver, ResolveConfig, discovery_client, main_server_section};
use tether_events::{BroadcastEventBus, EventBus};
use tether_remote_config::{FileRemoteConfigStore, RemoteConfigCache, remote_config_file_path};
use tether_settings::TetherSettings;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Resolve and hold a hub connection.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about = "Resolve and hold a hub connection")]
struct Cli {
    /// Settings file (defaults to `~/.tether/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Server API URL, overriding settings.
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Bearer token to use instead of the stored auth file.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the resolved connection configuration as JSON.
    Resolve,
    /// Connect and print inbound messages until interrupted.
    Connect,
}

impl Cli {
    fn load_settings(&self) -> TetherSettings {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(tether_settings::settings_path);
        let mut settings = tether_settings::load_settings_from_path(&path).unwrap_or_else(|e| {
            eprintln!("tether: ignoring settings at {}: {e}", path.display());
            TetherSettings::default()
        });
        if let Some(url) = &self.server_url {
            settings.server.api_url.clone_from(url);
        }
        settings
    }
}

/// Collaborators shared by both subcommands.
struct Services {
    tokens: Arc<dyn TokenProvider>,
    remote: Arc<RemoteConfigCache>,
    resolver: Arc<dyn ResolveConfig>,
}

fn build_services(settings: &TetherSettings, token: Option<&str>) -> Result<Services> {
    let data_dir = tether_settings::data_dir();
    let client = discovery_client(Duration::from_millis(settings.http.timeout_ms))
        .context("Failed to build HTTP client")?;

    let tokens: Arc<dyn TokenProvider> = match token {
        Some(token) => Arc::new(StaticTokenProvider::new(token)),
        None => Arc::new(StoredTokenProvider::with_client(
            auth_file_path(&data_dir),
            client.clone(),
        )),
    };

    let store = Arc::new(FileRemoteConfigStore::new(remote_config_file_path(&data_dir)));
    let mut remote = RemoteConfigCache::new(store);
    if let Some((url, key)) = settings.remote_config.signed_source() {
        remote = remote.with_signed_source(url, key, client.clone());
    }
    let remote = Arc::new(remote);
    let _warm_up = remote.spawn_warm_up();

    let resolver: Arc<dyn ResolveConfig> = Arc::new(ConfigurationResolver::new(
        Arc::clone(&tokens),
        Arc::clone(&remote),
        client,
    ));
    Ok(Services {
        tokens,
        remote,
        resolver,
    })
}

async fn resolve(settings: &TetherSettings, services: &Services) -> Result<()> {
    let options = ClientOptions::from_settings(settings);
    let config = services.resolver.resolve(&options.server).await;
    let force = options.force_full_transport
        || main_server_section(&services.remote)
            .await
            .is_some_and(|section| section.force_full_transport);
    let plan = plan(&config, &options.preferences, force);

    let output = serde_json::json!({
        "server": options.server,
        "config": config,
        "transports": plan.transports,
        "skipNegotiation": plan.skip_negotiation,
        "platformRestricted": options.preferences.platform_restricted,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn connect(settings: &TetherSettings, services: Services) -> Result<()> {
    let bus = Arc::new(BroadcastEventBus::new());
    let connector: Arc<dyn TransportConnector> =
        Arc::new(HttpTransportConnector::new(reqwest::Client::new()));
    let manager = ConnectionManager::new(
        ClientOptions::from_settings(settings),
        services.resolver,
        services.remote,
        services.tokens,
        Arc::clone(&bus) as Arc<dyn EventBus>,
        connector,
        Arc::new(settings.reconnect.clone()),
    );

    let cancel = CancellationToken::new();
    let handle = manager.get_or_create(&cancel).await?;
    let mut events = bus.subscribe();
    let mut messages = handle.messages();
    handle
        .start(&cancel)
        .await
        .context("Failed to connect")?;
    info!(
        hub_url = %handle.config().hub_url,
        connection_id = ?handle.connection_id(),
        "connected, press ctrl-c to stop"
    );

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for ctrl-c")?;
                break;
            }
            message = messages.recv() => match message {
                Ok(value) => println!("{value}"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "message consumer lagged"),
                Err(RecvError::Closed) => break,
            },
            event = events.recv() => match event {
                Ok(event) => info!(kind = event.event_type(), ?event, "lifecycle"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event consumer lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("Shutting down...");
    let _ = manager.dispose().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings();
    tether_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    if tether_settings::init_settings(settings.clone()).is_err() {
        warn!("settings were already initialized");
    }
    let settings = tether_settings::get_settings();

    let services = build_services(settings, args.token.as_deref())?;
    match args.command {
        Command::Resolve => resolve(settings, &services).await,
        Command::Connect => connect(settings, services).await,
    }
}
