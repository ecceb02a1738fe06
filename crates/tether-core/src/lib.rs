//! # tether-core
//!
//! Foundation types shared by every tether crate:
//!
//! - **Transports**: [`TransportKind`] and the ordered [`TransportSet`]
//! - **Connection parameters**: [`ConnectionConfig`], [`ServerIdentity`] and the pure
//!   field-by-field [`merge`]
//! - **Reconnection**: the [`ReconnectPolicy`] seam and [`ForeverRetryPolicy`]
//! - **Platform**: detection of runtimes that cannot sustain every transport
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod platform;
pub mod retry;
pub mod transport;

pub use config::{ConnectionConfig, ServerIdentity, merge};
pub use errors::CoreError;
pub use retry::{ForeverRetryPolicy, ReconnectPolicy, calculate_backoff_delay};
pub use transport::{TransportKind, TransportSet};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _config = ConnectionConfig::default();
        let _set = TransportSet::all();
        let _policy = ForeverRetryPolicy::default();
    }
}
