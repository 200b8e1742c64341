//! Durable key-value storage for the booking engine.
//!
//! The engine persists whole collections (appointments, notifications,
//! payments) as opaque JSON blobs under fixed keys. [`KeyValueStore`] is
//! the only contract the rest of the workspace depends on; [`FileStore`]
//! is the on-disk implementation and [`MemoryStore`] backs tests and
//! memory-only deployments.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Fixed storage keys.
pub mod keys {
    pub const APPOINTMENTS: &str = "appointments";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const PAYMENTS: &str = "payments";
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value is not valid JSON for this key: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Storage did not respond within {0:?}")]
    Timeout(Duration),
}

// ---------------------------------------------------------------------------
// KeyValueStore
// ---------------------------------------------------------------------------

/// Durable JSON blob storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing was stored.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
}

/// Read and decode `key`, giving up after `deadline`.
///
/// Startup must not block on slow storage; callers fall back to defaults
/// on any error, including [`StoreError::Timeout`].
pub async fn load_with_timeout<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    deadline: Duration,
) -> Result<Option<T>, StoreError> {
    let value = tokio::time::timeout(deadline, store.get(key))
        .await
        .map_err(|_| StoreError::Timeout(deadline))??;

    match value {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

/// Keys map to file names, so keep them to a safe alphabet.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    /// A store that never answers.
    struct StalledStore;

    #[async_trait]
    impl KeyValueStore for StalledStore {
        async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, StoreError> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: serde_json::Value) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn load_times_out_on_stalled_store() {
        let result: Result<Option<Vec<u32>>, _> =
            load_with_timeout(&StalledStore, keys::APPOINTMENTS, Duration::from_millis(20)).await;
        assert_matches!(result, Err(StoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn load_decodes_stored_value() {
        let store = MemoryStore::new();
        store.set("numbers", json!([1, 2, 3])).await.unwrap();

        let loaded: Option<Vec<u32>> =
            load_with_timeout(&store, "numbers", Duration::from_millis(100))
                .await
                .unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn load_missing_key_is_none() {
        let store = MemoryStore::new();
        let loaded: Option<Vec<u32>> =
            load_with_timeout(&store, "nothing", Duration::from_millis(100))
                .await
                .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn load_reports_shape_mismatch() {
        let store = MemoryStore::new();
        store.set("numbers", json!({"not": "a list"})).await.unwrap();
        let result: Result<Option<Vec<u32>>, _> =
            load_with_timeout(&store, "numbers", Duration::from_millis(100)).await;
        assert_matches!(result, Err(StoreError::Serde(_)));
    }

    #[test]
    fn key_alphabet() {
        assert!(validate_key("appointments").is_ok());
        assert!(validate_key("shop-1_data").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("").is_err());
    }
}
