//! Platform capability detection.
//!
//! Some runtime combinations cannot reliably keep a WebSocket alive. The known
//! case is running under the Wine compatibility layer, where the socket stack
//! drops long-lived upgrades. The negotiator removes WebSockets from the offered
//! transports on such platforms unless the server forces it.

/// Environment variables whose presence indicates the Wine compatibility layer.
const WINE_MARKERS: [&str; 3] = ["WINELOADER", "WINEPREFIX", "WINESERVER"];

/// Whether the current process runs on a restricted platform.
pub fn is_platform_restricted() -> bool {
    let restricted = detect_platform_restriction(|key| std::env::var(key).ok());
    if restricted {
        tracing::debug!("compatibility layer detected, WebSockets will be avoided");
    }
    restricted
}

/// Pure detection over an environment lookup, for tests and embedding.
pub fn detect_platform_restriction<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    WINE_MARKERS
        .iter()
        .any(|key| lookup(key).is_some_and(|v| !v.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn clean_environment_is_unrestricted() {
        let vars = env(&[("HOME", "/home/user")]);
        assert!(!detect_platform_restriction(|k| vars.get(k).cloned()));
    }

    #[test]
    fn wine_prefix_restricts() {
        let vars = env(&[("WINEPREFIX", "/home/user/.wine")]);
        assert!(detect_platform_restriction(|k| vars.get(k).cloned()));
    }

    #[test]
    fn empty_marker_is_ignored() {
        let vars = env(&[("WINELOADER", "  ")]);
        assert!(!detect_platform_restriction(|k| vars.get(k).cloned()));
    }
}
