//! # Batch Manager
//!
//! The only component that writes the RunTracker and Instance files. A manager
//! is created per orchestration key; binding it to an instance with
//! [`BatchManager::resume_or_create`] enables the batch-building operations.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{AggregateResults, Batch, BatchEntry, Instance, RunTracker, WorkItem};
use crate::config::PromoteConfig;
use crate::error::{PromoteError, Result};
use crate::storage::{read_json, write_json, BlobStore, StoreLayout};

/// Instance currently being built and its open batch
#[derive(Debug)]
struct BuildSession {
    instance: Instance,
    current: Batch,
}

#[derive(Debug)]
pub struct BatchManager {
    config: Arc<PromoteConfig>,
    store: Arc<dyn BlobStore>,
    layout: StoreLayout,
    session: Option<BuildSession>,
}

impl BatchManager {
    pub fn new(config: Arc<PromoteConfig>, store: Arc<dyn BlobStore>) -> Self {
        let layout = StoreLayout::new(&config.storage_root, &config.orchestration_key);
        Self {
            config,
            store,
            layout,
            session: None,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Instance bound by `resume_or_create`, if any
    pub fn instance(&self) -> Option<&Instance> {
        self.session.as_ref().map(|s| &s.instance)
    }

    pub async fn read_tracker(&self) -> Result<RunTracker> {
        Ok(read_json(self.store.as_ref(), &self.layout.tracker())
            .await?
            .unwrap_or_default())
    }

    async fn write_tracker(&self, tracker: &RunTracker) -> Result<()> {
        write_json(self.store.as_ref(), &self.layout.tracker(), tracker).await
    }

    async fn update_tracker(&self, instance_key: &str, done: bool, proceed: bool) -> Result<()> {
        let mut tracker = self.read_tracker().await?;
        tracker.set(instance_key, done, proceed);
        self.write_tracker(&tracker).await
    }

    /// Load an instance file; a missing file is a fatal orchestration error
    pub async fn load_instance(&self, instance_key: &str) -> Result<Instance> {
        read_json(self.store.as_ref(), &self.layout.instance(instance_key))
            .await?
            .ok_or_else(|| PromoteError::MissingInstance {
                instance_key: instance_key.to_string(),
            })
    }

    async fn save_instance(&self, instance: &Instance) -> Result<()> {
        write_json(self.store.as_ref(), &self.layout.instance(&instance.key), instance).await
    }

    pub async fn open_batch(&self, instance_key: &str, number: u32) -> Result<Batch> {
        Batch::open(
            number,
            self.config.batch_capacity,
            Arc::clone(&self.store),
            &self.layout,
            instance_key,
        )
        .await
    }

    /// Bind to `instance_key`, registering it and creating an empty instance if unseen
    #[instrument(skip(self))]
    pub async fn resume_or_create(&mut self, instance_key: &str) -> Result<&Instance> {
        let mut tracker = self.read_tracker().await?;

        let existing = if tracker.contains(instance_key) {
            read_json::<Instance>(self.store.as_ref(), &self.layout.instance(instance_key)).await?
        } else {
            tracker.register(instance_key);
            self.write_tracker(&tracker).await?;
            info!(instance = %instance_key, "Registered new instance");
            None
        };

        let instance = match existing {
            Some(instance) => {
                debug!(
                    instance = %instance_key,
                    last_batch = instance.last_batch,
                    "Resuming instance"
                );
                instance
            }
            None => {
                debug!(instance = %instance_key, "Creating instance file");
                let instance = Instance::new(instance_key);
                self.save_instance(&instance).await?;
                instance
            }
        };

        let current = self.open_batch(instance_key, instance.last_batch).await?;
        let session = self.session.insert(BuildSession { instance, current });
        Ok(&session.instance)
    }

    fn session_mut(&mut self) -> Result<&mut BuildSession> {
        self.session.as_mut().ok_or_else(|| {
            PromoteError::Orchestration("batch manager is not bound to an instance".to_string())
        })
    }

    /// Append an item, sealing the open batch and starting the next when full.
    ///
    /// A freshly created batch always has room, so failing to add after one
    /// rollover is a logic error.
    pub async fn add_work_item(&mut self, item: WorkItem) -> Result<()> {
        const MAX_ROLLOVERS: u32 = 1;

        let store = Arc::clone(&self.store);
        let layout = self.layout.clone();
        let capacity = self.config.batch_capacity;
        let session = self.session_mut()?;

        let mut rollovers = 0;
        loop {
            if session.current.can_add() {
                return session.current.add(item);
            }
            if rollovers >= MAX_ROLLOVERS {
                return Err(PromoteError::Orchestration(format!(
                    "could not add {} to freshly created batch {}",
                    item.path,
                    session.current.number()
                )));
            }
            rollovers += 1;

            session.current.flush().await?;
            let next = session.current.number() + 1;
            session.instance.last_batch = next;
            session.instance.batches.push(BatchEntry::new(next));
            write_json(
                store.as_ref(),
                &layout.instance(&session.instance.key),
                &session.instance,
            )
            .await?;
            info!(
                instance = %session.instance.key,
                sealed = next - 1,
                next = next,
                "Batch sealed, starting next batch"
            );
            session.current =
                Batch::open(next, capacity, Arc::clone(&store), &layout, &session.instance.key)
                    .await?;
        }
    }

    /// Flush the open batch, merge `extra`, and hand the instance to dispatch
    #[instrument(skip(self, extra))]
    pub async fn finalize_instance(&mut self, extra: Map<String, Value>) -> Result<Instance> {
        let session = self.session_mut()?;
        session.current.flush().await?;

        // A trailing batch that never received items has nothing to dispatch
        if session.current.is_empty() {
            let empty = session.current.number();
            session.instance.batches.retain(|b| b.number != empty);
        }

        session.instance.extra.extend(extra);
        session.instance.finalized_at = Some(Utc::now());
        let instance = session.instance.clone();

        self.save_instance(&instance).await?;
        self.update_tracker(&instance.key, false, true).await?;
        info!(
            instance = %instance.key,
            batches = instance.batches.len(),
            "Instance finalized and ready for dispatch"
        );
        Ok(instance)
    }

    /// Record aggregate results and retire the instance from dispatch
    #[instrument(skip(self, results))]
    pub async fn mark_complete(
        &self,
        instance_key: &str,
        results: Option<&AggregateResults>,
    ) -> Result<()> {
        if let Some(results) = results {
            write_json(
                self.store.as_ref(),
                &self.layout.instance_results(instance_key),
                results,
            )
            .await?;
        }
        self.update_tracker(instance_key, true, false).await?;
        info!(instance = %instance_key, "Instance marked complete");
        Ok(())
    }

    pub async fn read_aggregate_results(&self, instance_key: &str) -> Result<Option<AggregateResults>> {
        read_json(
            self.store.as_ref(),
            &self.layout.instance_results(instance_key),
        )
        .await
    }

    /// First-registered instance that is finalized and not yet complete
    pub async fn next_instance_to_dispatch(&self) -> Result<Option<String>> {
        Ok(self.read_tracker().await?.next_eligible().map(str::to_string))
    }

    /// Store the activation handle of a freshly triggered batch worker
    pub async fn record_dispatch(
        &self,
        instance_key: &str,
        batch_number: u32,
        activation_handle: &str,
    ) -> Result<Instance> {
        let mut instance = self.load_instance(instance_key).await?;
        let entry = instance.entry_mut(batch_number).ok_or_else(|| {
            PromoteError::Orchestration(format!(
                "instance {instance_key} has no batch {batch_number}"
            ))
        })?;
        entry.activation_handle = Some(activation_handle.to_string());
        self.save_instance(&instance).await?;
        Ok(instance)
    }

    /// Mark batches done; `abandoned` flags those whose worker vanished
    pub async fn mark_batches_done(
        &self,
        instance_key: &str,
        finished: &[(u32, bool)],
    ) -> Result<Instance> {
        let mut instance = self.load_instance(instance_key).await?;
        for &(number, abandoned) in finished {
            match instance.entry_mut(number) {
                Some(entry) => {
                    entry.done = true;
                    entry.abandoned = abandoned;
                }
                None => warn!(instance = %instance_key, batch = number, "Unknown batch marked done"),
            }
        }
        self.save_instance(&instance).await?;
        Ok(instance)
    }

    /// Maintenance: delete an instance's files and drop it from the tracker
    #[instrument(skip(self))]
    pub async fn cleanup_instance(&mut self, instance_key: &str) -> Result<u64> {
        let removed = self
            .store
            .delete(&self.layout.instance_dir(instance_key))
            .await?;
        let mut tracker = self.read_tracker().await?;
        if tracker.remove(instance_key) {
            self.write_tracker(&tracker).await?;
        }
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.instance.key == instance_key)
        {
            self.session = None;
        }
        info!(instance = %instance_key, removed = removed, "Instance state discarded");
        Ok(removed)
    }
}
