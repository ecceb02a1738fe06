//! The remote configuration document.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Last-fetched remote configuration: named opaque JSON sections plus the
/// time they were fetched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfigDocument {
    /// Sections keyed by name (`mainServer`, ...).
    pub sections: BTreeMap<String, serde_json::Value>,
    /// Fetch time in Unix seconds. `0` for the built-in document.
    pub fetched_at_unix_seconds: u64,
}

impl RemoteConfigDocument {
    /// Document stamped with the current time.
    pub fn fetched_now(sections: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            sections,
            fetched_at_unix_seconds: now_unix_seconds(),
        }
    }

    /// Raw section by name.
    pub fn section(&self, name: &str) -> Option<&serde_json::Value> {
        self.sections.get(name).filter(|v| !v.is_null())
    }

    /// Section deserialized as `T`.
    ///
    /// A section that fails to parse is logged and treated as absent.
    pub fn section_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let raw = self.section(name)?;
        match serde_json::from_value(raw.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(section = name, error = %e, "malformed remote config section, ignoring");
                None
            }
        }
    }
}

fn now_unix_seconds() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
