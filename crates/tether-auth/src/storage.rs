//! `auth.json` persistence.
//!
//! The file is owner-readable only (0o600 on unix) and replaced atomically
//! through a sibling temp file, so a crash mid-refresh never leaves a torn
//! token behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::errors::AuthError;
use crate::types::AuthStorage;

const AUTH_FILE_NAME: &str = "auth.json";
const SUPPORTED_VERSION: u32 = 1;

/// `<data_dir>/auth.json`.
pub fn auth_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(AUTH_FILE_NAME)
}

/// Read stored credentials.
///
/// A missing, unreadable, malformed or unknown-version file all yield
/// `None`; only the latter three are logged.
pub fn load_auth_storage(path: &Path) -> Option<AuthStorage> {
    let raw = std::fs::read(path)
        .inspect_err(|e| {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "auth file unreadable");
            }
        })
        .ok()?;
    let storage: AuthStorage = serde_json::from_slice(&raw)
        .inspect_err(|e| warn!(path = %path.display(), error = %e, "auth file malformed"))
        .ok()?;
    if storage.version != SUPPORTED_VERSION {
        warn!(version = storage.version, "auth file version not supported");
        return None;
    }
    Some(storage)
}

/// Stamp `last_updated` and write `storage` to `path`.
pub fn save_auth_storage(path: &Path, storage: &mut AuthStorage) -> Result<(), AuthError> {
    storage.last_updated = chrono::Utc::now().to_rfc3339();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, serde_json::to_vec_pretty(storage)?)?;
    restrict_permissions(&staging);
    std::fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!(path = %path.display(), error = %e, "could not restrict auth file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_file_loads_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(load_auth_storage(&auth_file_path(dir.path())).is_none());
    }

    #[test]
    fn saved_credentials_load_back_with_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = auth_file_path(dir.path());
        let mut storage = AuthStorage::new();
        storage.access_token = "tok".into();

        save_auth_storage(&path, &mut storage).unwrap();
        let loaded = load_auth_storage(&path).unwrap();
        assert_eq!(loaded.access_token, "tok");
        assert!(!loaded.last_updated.is_empty());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join(AUTH_FILE_NAME);
        save_auth_storage(&path, &mut AuthStorage::new()).unwrap();
        assert!(path.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = auth_file_path(dir.path());
        save_auth_storage(&path, &mut AuthStorage::new()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn unknown_version_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let path = auth_file_path(dir.path());
        std::fs::write(&path, r#"{"version": 2, "accessToken": "tok"}"#).unwrap();
        assert!(load_auth_storage(&path).is_none());
    }

    #[test]
    fn malformed_file_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let path = auth_file_path(dir.path());
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_auth_storage(&path).is_none());
    }
}
