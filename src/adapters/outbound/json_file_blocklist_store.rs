//! JSON File Blocklist Store
//!
//! Implements BlocklistStore as a JSON array of IP strings on disk.

use crate::domain::errors::StoreError;
use crate::domain::ports::BlocklistStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File-backed blocklist store.
///
/// Each save writes the whole snapshot to a sibling temp file and renames
/// it over the target, so readers never see a half-written file. Writes
/// are serialized through an async mutex.
pub struct JsonFileBlocklistStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileBlocklistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl BlocklistStore for JsonFileBlocklistStore {
    async fn save_snapshot(&self, ips: &[String]) -> Result<(), StoreError> {
        let mut sorted = ips.to_vec();
        sorted.sort();
        let body = serde_json::to_vec_pretty(&sorted)?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, body).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!("saved {} blocked ips to {}", sorted.len(), self.path.display());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Vec<String>, StoreError> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(e) => return Err(e.into()),
        };

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileBlocklistStore::new(dir.path().join("blocked.json"));

        let result = store.load_snapshot().await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileBlocklistStore::new(dir.path().join("blocked.json"));

        store
            .save_snapshot(&ips(&["203.0.113.5", "10.0.0.1"]))
            .await
            .unwrap();

        let loaded = store.load_snapshot().await.unwrap();
        assert_eq!(loaded, ips(&["10.0.0.1", "203.0.113.5"]));
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileBlocklistStore::new(dir.path().join("blocked.json"));

        store.save_snapshot(&ips(&["10.0.0.1", "10.0.0.2"])).await.unwrap();
        store.save_snapshot(&ips(&["10.0.0.3"])).await.unwrap();

        assert_eq!(store.load_snapshot().await.unwrap(), ips(&["10.0.0.3"]));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileBlocklistStore::new(dir.path().join("nested/state/blocked.json"));

        store.save_snapshot(&ips(&["10.0.0.1"])).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_empty_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocked.json");
        std::fs::write(&path, "\n").unwrap();

        let store = JsonFileBlocklistStore::new(path);
        assert!(store.load_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocked.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileBlocklistStore::new(path);
        assert!(matches!(
            store.load_snapshot().await,
            Err(StoreError::Serde(_))
        ));
    }

    #[tokio::test]
    async fn test_unwritable_location_is_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        // Parent "directory" is a regular file
        let store = JsonFileBlocklistStore::new(blocker.join("blocked.json"));
        assert!(matches!(
            store.save_snapshot(&ips(&["10.0.0.1"])).await,
            Err(StoreError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_saves_leave_valid_file() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileBlocklistStore::new(dir.path().join("blocked.json")));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .save_snapshot(&[format!("10.0.0.{}", i)])
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let loaded = store.load_snapshot().await.unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
