//! # Blob Storage
//!
//! Path-addressed blob capability backing the RunTracker, Instance and Batch
//! files. Missing keys read as `None`; callers decide whether absence is fatal.
//!
//! Writes are last-writer-wins. There is no version or ETag check, so two
//! concurrent read-modify-write cycles on the same path can lose an update.

mod filesystem;
mod layout;
mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use crate::error::Result;

pub use filesystem::FileSystemBlobStore;
pub use layout::StoreLayout;
pub use memory::InMemoryBlobStore;

#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Read a blob, `None` when absent
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a blob
    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<()>;

    /// Paths of all blobs under a prefix, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete a blob or every blob under a prefix; returns how many were removed
    async fn delete(&self, prefix: &str) -> Result<u64>;
}

/// Read and decode a JSON blob
pub async fn read_json<T: DeserializeOwned>(store: &dyn BlobStore, path: &str) -> Result<Option<T>> {
    match store.read(path).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON blob
pub async fn write_json<T: Serialize + Sync>(store: &dyn BlobStore, path: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store.write(path, bytes).await
}

/// Normalise a prefix so `a/b` never matches `a/bc`
pub(crate) fn is_under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
