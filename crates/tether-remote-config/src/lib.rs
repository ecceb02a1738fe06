//! # tether-remote-config
//!
//! Remote configuration for the connection layer:
//!
//! - [`RemoteConfigDocument`]: named JSON sections plus a fetch timestamp
//! - [`RemoteConfigStore`]: persistence seam ([`FileRemoteConfigStore`],
//!   [`MemoryRemoteConfigStore`])
//! - [`RemoteConfigCache`]: once-per-process warm-up, read-mostly access and
//!   wholesale replacement
//! - [`verify`]: Ed25519 verification of timestamped payloads, and the
//!   [`SignedEnvelope`] path that applies a document only when it verifies

#![deny(unsafe_code)]

pub mod cache;
pub mod document;
pub mod errors;
pub mod signed;
pub mod store;
pub mod verify;

pub use cache::RemoteConfigCache;
pub use document::RemoteConfigDocument;
pub use errors::{RemoteConfigError, Result};
pub use signed::{ApplyOutcome, SignedEnvelope, fetch_signed};
pub use store::{
    FileRemoteConfigStore, MemoryRemoteConfigStore, RemoteConfigStore, remote_config_file_path,
};
pub use verify::verify;
