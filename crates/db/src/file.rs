//! JSON-file [`KeyValueStore`]: one `<key>.json` file per key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{validate_key, KeyValueStore, StoreError};

/// Stores each key as a JSON document under a data directory.
///
/// Writes go to a temporary file that is then renamed over the target, so a
/// crash mid-write leaves the previous value intact.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "File store opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));

        let bytes = serde_json::to_vec_pretty(&value)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::trace!(key, bytes = bytes.len(), "File store write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store
            .set("notifications", json!([{"id": "n1", "read": false}]))
            .await
            .unwrap();

        // A second handle on the same directory sees the write.
        let reopened = FileStore::open(dir.path()).await.unwrap();
        let value = reopened.get("notifications").await.unwrap().unwrap();
        assert_eq!(value[0]["id"], "n1");
        assert!(dir.path().join("notifications.json").exists());
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.get("payments").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("appointments.json"), b"{not json").unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert_matches!(store.get("appointments").await, Err(StoreError::Serde(_)));
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert_matches!(
            store.set("../escape", json!(1)).await,
            Err(StoreError::InvalidKey(_))
        );
    }

    #[tokio::test]
    async fn open_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open(&nested).await.unwrap();
        assert!(store.dir().is_dir());
    }
}
