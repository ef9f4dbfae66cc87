// File-backed key/value store
// reason: one file per key keeps writes independent and atomic via rename
use async_trait::async_trait;
use directories::ProjectDirs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use shiftswap_core::error::{AppError, Result};
use shiftswap_core::port::KeyValueStore;

/// Platform data directory for this application, if the OS exposes one
pub fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "shiftswap", "shiftswap").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Key/value store rooted at a directory on this device
///
/// Each key maps to `<dir>/<key>.json`. Writes go to a temporary file
/// first and are renamed into place.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Create the store; the directory is created lazily on first write
    ///
    /// # Example
    /// ```ignore
    /// let store = FileKeyValueStore::new("/var/lib/shiftswap");
    /// ```
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(AppError::Storage(format!("invalid key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn storage_err(action: &str, path: &Path, e: std::io::Error) -> AppError {
    AppError::Storage(format!("{} {}: {}", action, path.display(), e))
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err("read", &path, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_err("create", &self.dir, e))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .await
            .map_err(|e| storage_err("write", &tmp, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_err("rename", &path, e))?;

        debug!(key = key, bytes = value.len(), "Local value written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("remove", &path, e)),
        }
    }
}
