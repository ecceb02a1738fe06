//! # tether-discovery
//!
//! Turns a [`ServerIdentity`](tether_core::ServerIdentity) into a
//! [`ConnectionConfig`](tether_core::ConnectionConfig) using the in-memory
//! cache, a stapled or fetched well-known discovery document, the remote
//! `mainServer` section and the synthesized per-server default.

#![deny(unsafe_code)]

pub mod errors;
pub mod resolver;
pub mod well_known;

pub use errors::DiscoveryError;
pub use resolver::{
    ConfigurationResolver, MainServerSection, ResolveConfig, discovery_client, main_server_section,
};
pub use well_known::well_known_url;
