use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::asset::{unique_asset_name, AssetKind};
use crate::storage::{StorageBackend, StorageError};

/// Process-local storage backend, used by tests and throwaway dev runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<(AssetKind, String), Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, kind: AssetKind) -> usize {
        self.files
            .read()
            .await
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn put(
        &self,
        kind: AssetKind,
        original_name: &str,
        fallback_ext: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let mut files = self.files.write().await;
        let mut name = unique_asset_name(kind, original_name, fallback_ext);
        while files.contains_key(&(kind, name.clone())) {
            name = unique_asset_name(kind, original_name, fallback_ext);
        }
        files.insert((kind, name.clone()), data.to_vec());
        Ok(name)
    }

    async fn read(&self, kind: AssetKind, name: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .read()
            .await
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{kind}/{name}")))
    }

    async fn exists(&self, kind: AssetKind, name: &str) -> bool {
        self.files
            .read()
            .await
            .contains_key(&(kind, name.to_string()))
    }

    async fn delete(&self, kind: AssetKind, name: &str) -> Result<(), StorageError> {
        self.files.write().await.remove(&(kind, name.to_string()));
        Ok(())
    }
}
