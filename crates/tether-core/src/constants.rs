//! Package-level constants.

/// Current version of tether (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Product name, used in the well-known discovery path and the data directory.
pub const NAME: &str = "tether";

/// Fixed path of the hub endpoint relative to a server's API URL.
pub const HUB_PATH: &str = "hub";

/// Well-known discovery path served from the hub host.
pub const WELL_KNOWN_PATH: &str = "/.well-known/tether/client";

/// Remote configuration section describing the main server connection.
pub const MAIN_SERVER_SECTION: &str = "mainServer";

/// Maximum number of redirects followed by the discovery fetch.
pub const DISCOVERY_MAX_REDIRECTS: usize = 5;
