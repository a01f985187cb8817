use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use super::{is_under_prefix, BlobStore};
use crate::error::Result;

/// Process-local blob store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(path).map(|entry| entry.value().clone()))
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .blobs
            .iter()
            .filter(|entry| is_under_prefix(entry.key(), prefix))
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn delete(&self, prefix: &str) -> Result<u64> {
        let before = self.blobs.len();
        self.blobs.retain(|key, _| !is_under_prefix(key, prefix));
        Ok((before - self.blobs.len()) as u64)
    }
}
