//! Durable storage for the remote configuration document.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::document::RemoteConfigDocument;
use crate::errors::Result;

/// Default remote config file name under the data directory.
const REMOTE_CONFIG_FILE_NAME: &str = "remote-config.json";

/// Get the remote config file path under the given data directory.
pub fn remote_config_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(REMOTE_CONFIG_FILE_NAME)
}

/// Persistence for the last-fetched document.
pub trait RemoteConfigStore: Send + Sync {
    /// Load the persisted document. `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<RemoteConfigDocument>>;

    /// Replace the persisted document.
    fn save(&self, document: &RemoteConfigDocument) -> Result<()>;
}

/// JSON file store.
#[derive(Clone, Debug)]
pub struct FileRemoteConfigStore {
    path: PathBuf,
}

impl FileRemoteConfigStore {
    /// Store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RemoteConfigStore for FileRemoteConfigStore {
    fn load(&self) -> Result<Option<RemoteConfigDocument>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn save(&self, document: &RemoteConfigDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(document)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryRemoteConfigStore {
    document: Mutex<Option<RemoteConfigDocument>>,
}

impl MemoryRemoteConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `document`.
    pub fn with_document(document: RemoteConfigDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
        }
    }
}

impl RemoteConfigStore for MemoryRemoteConfigStore {
    fn load(&self) -> Result<Option<RemoteConfigDocument>> {
        Ok(self.document.lock().clone())
    }

    fn save(&self, document: &RemoteConfigDocument) -> Result<()> {
        *self.document.lock() = Some(document.clone());
        Ok(())
    }
}
