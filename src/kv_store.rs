//! String-keyed persistent storage.
//!
//! The opportunity and session stores only ever see the `KeyValueStore`
//! trait. `FileStore` keeps one JSON file per key on disk; `MemoryStore` is
//! process-local and can be told to fail, which is how the failure paths
//! of the stores above it get exercised.
use std::{
    collections::HashMap,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use log::{debug, error, trace};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::{Result, StoreError};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when the key was never written or has been removed.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Keeps every key in its own file under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Helper method to get the file path for a key
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        trace!("Reading key {} from {}", key, path.display());

        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Key {} not present", key);
                Ok(None)
            }
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                Err(StoreError::StorageRead {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key)?;
        let dir = self.dir.clone();
        let value = value.to_string();

        let written = tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &value))
            .await
            .map_err(|e| StoreError::StorageWrite {
                key: key.to_string(),
                message: format!("write task failed: {}", e),
            })?;

        written.map_err(|e| {
            error!("Failed to write key {}: {}", key, e);
            StoreError::StorageWrite {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed key {}", key);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::StorageWrite {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Writes through a temporary file in the same directory and renames it
/// over the target, so readers never see a half-written value.
fn write_atomically(dir: &Path, path: &Path, value: &str) -> io::Result<()> {
    if !dir.exists() {
        debug!("Creating storage directory: {}", dir.display());
        std::fs::create_dir_all(dir)?;
    }

    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(value.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    trace!("Persisted {}", path.display());
    Ok(())
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `get` fail until switched off again
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `set`/`remove` fail until switched off again
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::StorageRead {
                key: key.to_string(),
                message: "reads disabled".to_string(),
            });
        }
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::StorageWrite {
                key: key.to_string(),
                message: "writes disabled".to_string(),
            });
        }
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::StorageWrite {
                key: key.to_string(),
                message: "writes disabled".to_string(),
            });
        }
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_store_round_trips_and_removes() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("data"));

        assert_eq!(store.get("userName").await.unwrap(), None);

        store.set("userName", "Ada").await.unwrap();
        assert_eq!(store.get("userName").await.unwrap().as_deref(), Some("Ada"));

        store.set("userName", "Grace").await.unwrap();
        assert_eq!(
            store.get("userName").await.unwrap().as_deref(),
            Some("Grace")
        );

        store.remove("userName").await.unwrap();
        store.remove("userName").await.unwrap();
        assert_eq!(store.get("userName").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        FileStore::new(temp_dir.path())
            .set("appThemeMode", "dark")
            .await
            .unwrap();

        let reopened = FileStore::new(temp_dir.path());
        assert_eq!(
            reopened.get("appThemeMode").await.unwrap().as_deref(),
            Some("dark")
        );
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        let result = store.set("../escape", "x").await;

        assert!(matches!(result, Err(StoreError::InvalidKey { .. })));
    }

    #[tokio::test]
    async fn memory_store_fault_injection() {
        let store = MemoryStore::new();
        store.set("isAdmin", "true").await.unwrap();

        store.fail_reads(true);
        assert!(matches!(
            store.get("isAdmin").await,
            Err(StoreError::StorageRead { .. })
        ));
        store.fail_reads(false);

        store.fail_writes(true);
        assert!(store.set("isAdmin", "false").await.is_err());
        assert!(store.remove("isAdmin").await.is_err());
        store.fail_writes(false);

        assert_eq!(store.get("isAdmin").await.unwrap().as_deref(), Some("true"));
    }
}
