//! # tether-auth
//!
//! Bearer credentials for the connection layer.
//!
//! - [`TokenProvider`]: the seam the connection factory calls on every
//!   connect and reconnect attempt
//! - [`StaticTokenProvider`]: a fixed token
//! - [`StoredTokenProvider`]: `~/.tether/auth.json` with refresh-token renewal
//!
//! The auth file may also carry discovery documents stapled by the issuer,
//! which the configuration resolver prefers over a network fetch.

#![deny(unsafe_code)]

pub mod errors;
pub mod provider;
pub mod storage;
pub mod types;

pub use errors::AuthError;
pub use provider::{StaticTokenProvider, StoredTokenProvider, TokenProvider};
pub use storage::{auth_file_path, load_auth_storage, save_auth_storage};
pub use types::{AuthStorage, now_ms, should_refresh};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
