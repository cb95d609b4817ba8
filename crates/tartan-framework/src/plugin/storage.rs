//! Key/value storage contract for plugins.
//!
//! The engine does not persist anything itself. Plugins that keep state
//! (counters, triggers, banners) receive an optional [`StringStorer`] in
//! their [`PluginLoadContext`](super::PluginLoadContext). [`MemoryStorer`] is
//! a process-local implementation for tests and small bots.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tartan_core::StorageResult;

/// String key/value storage.
#[async_trait]
pub trait StringStorer: Send + Sync {
    /// Returns the value stored under `key`.
    async fn get_string(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn put_string(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete_string(&self, key: &str) -> StorageResult<()>;

    /// Returns every entry whose key starts with `prefix`, ordered by key.
    async fn scan(&self, prefix: &str) -> StorageResult<Vec<(String, String)>>;
}

/// Shared storer.
pub type BoxedStorer = Arc<dyn StringStorer>;

/// In-memory [`StringStorer`].
#[derive(Debug, Default)]
pub struct MemoryStorer {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorer {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl StringStorer for MemoryStorer {
    async fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put_string(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_string(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> StorageResult<Vec<(String, String)>> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStorer::new();
        assert_eq!(store.get_string("karma.alice").await.unwrap(), None);

        store.put_string("karma.alice", "3").await.unwrap();
        assert_eq!(
            store.get_string("karma.alice").await.unwrap().as_deref(),
            Some("3")
        );

        store.delete_string("karma.alice").await.unwrap();
        store.delete_string("karma.alice").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_scan_by_prefix() {
        let store = MemoryStorer::new();
        for (k, v) in [("karma.bob", "1"), ("banner.C1", "hi"), ("karma.alice", "2")] {
            store.put_string(k, v).await.unwrap();
        }

        let karma = store.scan("karma.").await.unwrap();
        assert_eq!(
            karma,
            vec![
                ("karma.alice".to_string(), "2".to_string()),
                ("karma.bob".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(store.scan("").await.unwrap().len(), 3);
    }
}
