//! Structured logging with `tracing`.
//!
//! Every crate logs through `tracing` macros with structured fields. The
//! binary installs a subscriber once at startup with [`init_subscriber`];
//! libraries never install one themselves.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber writing to stderr.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - Default filter directive (e.g. `"info"`, `"tether_client=debug"`).
/// * `json` - Emit one JSON object per line instead of compact text.
pub fn init_subscriber(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init is a no-op if a global subscriber is already set
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}
