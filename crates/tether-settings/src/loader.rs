//! Layered settings loading.
//!
//! Compiled defaults are serialized to JSON, the user's `settings.json` is
//! merged over them key by key, the result is deserialized back, and finally
//! `TETHER_*` variables are applied on the typed struct. A `null` in the
//! file means "keep the default"; arrays and scalars replace wholesale.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tether_core::TransportSet;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::TetherSettings;

/// Resolve the tether data directory: `$TETHER_HOME`, else `~/.tether`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = read_env_string("TETHER_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tether")
}

/// Resolve the path to the settings file.
pub fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TetherSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TetherSettings> {
    let mut settings = load_file_layers(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults deep-merged with the settings file, without env overrides.
pub fn load_file_layers(path: &Path) -> Result<TetherSettings> {
    let mut layered = serde_json::to_value(TetherSettings::default())?;
    match std::fs::read(path) {
        Ok(raw) => {
            debug!(path = %path.display(), "merging settings file");
            deep_merge(&mut layered, serde_json::from_slice(&raw)?);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(serde_json::from_value(layered)?)
}

/// Reject settings that cannot describe a reachable server.
pub fn validate(settings: &TetherSettings) -> Result<()> {
    if settings.server.api_url.trim().is_empty() {
        return Err(SettingsError::InvalidValue("server.apiUrl is empty".into()));
    }
    if settings.http.timeout_ms == 0 {
        return Err(SettingsError::InvalidValue("http.timeoutMs must be positive".into()));
    }
    Ok(())
}

/// Merge `overlay` into `base` in place.
///
/// Objects merge per key, `null` keys in `overlay` are ignored, anything
/// else in `overlay` replaces what `base` had.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    let fields = match overlay {
        Value::Object(fields) => fields,
        other => {
            *base = other;
            return;
        }
    };
    match base {
        Value::Object(base_fields) => {
            for (key, value) in fields.into_iter().filter(|(_, v)| !v.is_null()) {
                match base_fields.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        let _ = base_fields.insert(key, value);
                    }
                }
            }
        }
        other => *other = Value::Object(fields),
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut TetherSettings) {
    apply_env_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply environment overrides read through `lookup`.
///
/// Empty values count as unset. Values that fail to parse are logged and
/// leave the file or default value in place.
pub fn apply_env_overrides_from<F>(settings: &mut TetherSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("TETHER_SERVER_URL") {
        settings.server.api_url = v;
    }
    if let Some(v) = env.string("TETHER_SERVER_NAME") {
        settings.server.name = v;
    }

    // ── Transport ───────────────────────────────────────────────────
    if let Some(v) = env.transports("TETHER_TRANSPORTS") {
        settings.transport.preferred = v;
    }
    if let Some(v) = env.bool("TETHER_ALLOW_FALLBACK") {
        settings.transport.allow_fallback = v;
    }
    if let Some(v) = env.bool("TETHER_FORCE_FULL_TRANSPORT") {
        settings.transport.force_full_transport = v;
    }
    if let Some(v) = env.bool("TETHER_PLATFORM_RESTRICTED") {
        settings.transport.platform_restricted = Some(v);
    }

    // ── HTTP ────────────────────────────────────────────────────────
    if let Some(v) = env.u64("TETHER_HTTP_TIMEOUT_MS", 100..=600_000) {
        settings.http.timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TETHER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("TETHER_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Parsing ─────────────────────────────────────────────────────────────────

const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
const FALSY: [&str; 4] = ["false", "0", "no", "off"];

/// Case-insensitive boolean: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    let val = val.trim();
    if TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(val)) {
        Some(true)
    } else if FALSY.iter().any(|f| f.eq_ignore_ascii_case(val)) {
        Some(false)
    } else {
        None
    }
}

/// An integer inside `range`.
pub fn parse_u64_in(val: &str, range: std::ops::RangeInclusive<u64>) -> Option<u64> {
    val.trim().parse().ok().filter(|n| range.contains(n))
}

// ── Readers ─────────────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let raw = self.string(name)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            warn!(variable = name, value = %raw, "ignoring unparseable environment override");
        }
        parsed
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, parse_bool)
    }

    fn u64(&self, name: &str, range: std::ops::RangeInclusive<u64>) -> Option<u64> {
        self.parsed(name, |raw| parse_u64_in(raw, range))
    }

    fn transports(&self, name: &str) -> Option<TransportSet> {
        self.parsed(name, |raw| raw.parse().ok())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tether_core::TransportKind;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "server": {"apiUrl": "https://a/", "name": "a"}
        });
        let source = serde_json::json!({
            "server": {"apiUrl": "https://b/"}
        });
        let mut merged = target;
        deep_merge(&mut merged, source);
        assert_eq!(merged["server"]["apiUrl"], "https://b/");
        assert_eq!(merged["server"]["name"], "a");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"preferred": ["WebSockets", "LongPolling"]});
        let source = serde_json::json!({"preferred": ["LongPolling"]});
        let mut merged = target;
        deep_merge(&mut merged, source);
        assert_eq!(merged["preferred"], serde_json::json!(["LongPolling"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let mut merged = target;
        deep_merge(&mut merged, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let mut merged = target;
        deep_merge(&mut merged, source);
        assert_eq!(merged["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file_layers(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.api_url, "https://localhost/");
        assert_eq!(settings.http.timeout_ms, 10_000);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"apiUrl": "https://sync.example/"}, "transport": {"preferred": ["LongPolling"]}}"#,
        )
        .unwrap();

        let settings = load_file_layers(&path).unwrap();
        assert_eq!(settings.server.api_url, "https://sync.example/");
        assert_eq!(settings.server.name, "default");
        assert!(settings.transport.preferred.is_only(TransportKind::LongPolling));
        assert!(settings.transport.allow_fallback);
    }

    #[test]
    fn load_accepts_flag_transports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"transport": {"preferred": 1}}"#).unwrap();

        let settings = load_file_layers(&path).unwrap();
        assert!(settings.transport.preferred.is_only(TransportKind::WebSockets));
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn validate_rejects_empty_api_url() {
        let mut settings = TetherSettings::default();
        settings.server.api_url = " ".into();
        assert!(matches!(
            validate(&settings).unwrap_err(),
            SettingsError::InvalidValue(_)
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut settings = TetherSettings::default();
        settings.http.timeout_ms = 0;
        assert!(validate(&settings).is_err());
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let vars = env(&[
            ("TETHER_SERVER_URL", "https://env.example/"),
            ("TETHER_TRANSPORTS", "sse,lp"),
            ("TETHER_ALLOW_FALLBACK", "off"),
            ("TETHER_PLATFORM_RESTRICTED", "yes"),
            ("TETHER_HTTP_TIMEOUT_MS", "2500"),
            ("TETHER_LOG_JSON", "1"),
        ]);
        let mut settings = TetherSettings::default();
        apply_env_overrides_from(&mut settings, |k| vars.get(k).cloned());

        assert_eq!(settings.server.api_url, "https://env.example/");
        assert_eq!(
            settings.transport.preferred,
            TransportSet::only(TransportKind::ServerSentEvents).with(TransportKind::LongPolling)
        );
        assert!(!settings.transport.allow_fallback);
        assert_eq!(settings.transport.platform_restricted, Some(true));
        assert_eq!(settings.http.timeout_ms, 2500);
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let vars = env(&[
            ("TETHER_ALLOW_FALLBACK", "maybe"),
            ("TETHER_HTTP_TIMEOUT_MS", "5"),
            ("TETHER_TRANSPORTS", "ws,carrier-pigeon"),
            ("TETHER_SERVER_URL", ""),
        ]);
        let mut settings = TetherSettings::default();
        apply_env_overrides_from(&mut settings, |k| vars.get(k).cloned());

        assert!(settings.transport.allow_fallback);
        assert_eq!(settings.http.timeout_ms, 10_000);
        assert!(settings.transport.preferred.is_empty());
        assert_eq!(settings.server.api_url, "https://localhost/");
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "OFF"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_in("1000", 1000..=600_000), Some(1000));
        assert_eq!(parse_u64_in(" 600000 ", 1000..=600_000), Some(600_000));
        assert_eq!(parse_u64_in("500", 1000..=600_000), None);
        assert_eq!(parse_u64_in("abc", 1000..=600_000), None);
    }
}
