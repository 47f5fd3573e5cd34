//! In-process key/value store

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{KvEntry, KvError, KvStore};

/// HashMap-backed store, used for tests and store-less tooling
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, KvEntry>>,
}

impl MemoryKvStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.read().get(key).map(|e| e.value.clone()))
    }

    async fn get_with_metadata(&self, key: &str) -> Result<Option<KvEntry>, KvError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(), KvError> {
        self.entries.write().insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                metadata: metadata.cloned(),
            },
        );
        Ok(())
    }
}
