use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{BatchResults, WorkItem};
use crate::error::{PromoteError, Result};
use crate::storage::{read_json, write_json, BlobStore, StoreLayout};

/// On-disk shape of a batch's item list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BatchInfo {
    number: u32,
    items: Vec<WorkItem>,
}

#[derive(Debug, Clone)]
struct BatchStorage {
    store: Arc<dyn BlobStore>,
    info_path: String,
    results_path: String,
}

/// Capacity-bounded shard of work items.
///
/// Items accumulate in memory until [`Batch::flush`] appends them to the
/// batch-info file. Without storage the batch runs in degraded mode and
/// silently drops added items.
#[derive(Debug, Clone)]
pub struct Batch {
    number: u32,
    capacity: usize,
    storage: Option<BatchStorage>,
    persisted: usize,
    pending: Vec<WorkItem>,
}

impl Batch {
    /// Open batch `number` of `instance_key`, counting already-persisted items
    pub async fn open(
        number: u32,
        capacity: usize,
        store: Arc<dyn BlobStore>,
        layout: &StoreLayout,
        instance_key: &str,
    ) -> Result<Self> {
        let storage = BatchStorage {
            store,
            info_path: layout.batch_info(instance_key, number),
            results_path: layout.batch_results(instance_key, number),
        };
        let persisted = read_json::<BatchInfo>(storage.store.as_ref(), &storage.info_path)
            .await?
            .map(|info| info.items.len())
            .unwrap_or(0);

        Ok(Self {
            number,
            capacity,
            storage: Some(storage),
            persisted,
            pending: Vec::new(),
        })
    }

    /// A batch with no storage handles; adds are no-ops
    pub fn detached(number: u32, capacity: usize) -> Self {
        Self {
            number,
            capacity,
            storage: None,
            persisted: 0,
            pending: Vec::new(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Persisted plus buffered items
    pub fn len(&self) -> usize {
        self.persisted + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn can_add(&self) -> bool {
        !self.is_sealed()
    }

    pub fn has_unflushed(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn add(&mut self, item: WorkItem) -> Result<()> {
        if self.storage.is_none() {
            debug!(batch = self.number, path = %item.path, "Batch has no storage, dropping item");
            return Ok(());
        }
        if self.is_sealed() {
            return Err(PromoteError::Orchestration(format!(
                "batch {} is sealed at {} items",
                self.number, self.capacity
            )));
        }
        self.pending.push(item);
        Ok(())
    }

    /// Append buffered items to the batch-info file and clear the buffer
    #[instrument(skip(self), fields(batch = self.number, pending = self.pending.len()))]
    pub async fn flush(&mut self) -> Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut info = read_json::<BatchInfo>(storage.store.as_ref(), &storage.info_path)
            .await?
            .unwrap_or_else(|| BatchInfo {
                number: self.number,
                items: Vec::new(),
            });
        info.items.append(&mut self.pending);
        write_json(storage.store.as_ref(), &storage.info_path, &info).await?;

        self.persisted = info.items.len();
        debug!(batch = self.number, items = self.persisted, "Batch flushed");
        Ok(())
    }

    /// Persisted items followed by any still-buffered ones, in insertion order
    pub async fn items(&self) -> Result<Vec<WorkItem>> {
        let mut items = match &self.storage {
            Some(storage) => read_json::<BatchInfo>(storage.store.as_ref(), &storage.info_path)
                .await?
                .map(|info| info.items)
                .unwrap_or_default(),
            None => Vec::new(),
        };
        items.extend(self.pending.iter().cloned());
        Ok(items)
    }

    pub async fn write_results(&self, results: &BatchResults) -> Result<()> {
        match &self.storage {
            Some(storage) => {
                write_json(storage.store.as_ref(), &storage.results_path, results).await
            }
            None => Ok(()),
        }
    }

    /// `None` until the worker has written results
    pub async fn read_results(&self) -> Result<Option<BatchResults>> {
        match &self.storage {
            Some(storage) => read_json(storage.store.as_ref(), &storage.results_path).await,
            None => Ok(None),
        }
    }
}
