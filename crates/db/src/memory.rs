//! In-memory [`KeyValueStore`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{validate_key, KeyValueStore, StoreError};

/// Holds values in a map. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total successful `set` calls, across all keys.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        validate_key(key)?;
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        validate_key(key)?;
        self.values.write().await.insert(key.to_owned(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStore::new();
        assert!(store.get("appointments").await.unwrap().is_none());

        store.set("appointments", json!([{"id": "a1"}])).await.unwrap();
        let value = store.get("appointments").await.unwrap().unwrap();
        assert_eq!(value[0]["id"], "a1");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn set_replaces_previous_value() {
        let store = MemoryStore::new();
        store.set("k", json!(1)).await.unwrap();
        store.set("k", json!(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }
}
