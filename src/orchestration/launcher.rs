use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::discard_run_state;
use crate::batch::{BatchManager, WorkItem};
use crate::config::PromoteConfig;
use crate::error::{PromoteError, Result};
use crate::logging::log_run_operation;
use crate::status::{run_status_key, LivenessProbe, RunState, RunStatus, RunStatusTracker, StatusUpdate};
use crate::storage::BlobStore;

/// Starts runs while honouring "at most one active run per target".
///
/// The guard reads state and then writes it with no lock, so two launchers
/// racing on the same instance key can both pass it.
#[derive(Debug, Clone)]
pub struct RunLauncher {
    config: Arc<PromoteConfig>,
    store: Arc<dyn BlobStore>,
    statuses: RunStatusTracker,
    probe: LivenessProbe,
}

impl RunLauncher {
    pub fn new(
        config: Arc<PromoteConfig>,
        store: Arc<dyn BlobStore>,
        statuses: RunStatusTracker,
        probe: LivenessProbe,
    ) -> Self {
        Self {
            config,
            store,
            statuses,
            probe,
        }
    }

    /// Begin a new run for `instance_key`.
    ///
    /// Refuses with [`PromoteError::RunInProgress`] when the stored run status
    /// is live or the instance is still being dispatched. A build left
    /// unfinalized by a stopped builder is resumed from its last sealed batch.
    /// State left by a completed run is discarded and a fresh instance is bound.
    #[instrument(skip(self))]
    pub async fn begin(
        &self,
        instance_key: &str,
        triggered_by: &str,
        activation_handle: Option<&str>,
    ) -> Result<RunHandle> {
        let run_key = run_status_key(&self.config.orchestration_key, instance_key);
        let current = self.statuses.get(&run_key).await?;

        if self.probe.is_in_progress(&current, None).await? {
            warn!(instance = %instance_key, status = %current.status, "Run already in progress");
            return Err(PromoteError::RunInProgress {
                instance_key: instance_key.to_string(),
                activation_handle: current.activation_handle,
            });
        }

        let mut manager = BatchManager::new(Arc::clone(&self.config), Arc::clone(&self.store));
        let tracker = manager.read_tracker().await?;
        if tracker.entry(instance_key).is_some_and(|e| e.is_eligible()) {
            warn!(instance = %instance_key, "Instance is still being dispatched");
            return Err(PromoteError::RunInProgress {
                instance_key: instance_key.to_string(),
                activation_handle: None,
            });
        }

        // A completed run starts over; an unfinalized build is resumed below
        if tracker.entry(instance_key).is_some_and(|e| e.done) {
            discard_run_state(
                &mut manager,
                &self.statuses,
                &self.config.orchestration_key,
                instance_key,
            )
            .await?;
        }

        let status = self
            .statuses
            .reset(
                &run_key,
                StatusUpdate::status(RunState::Started)
                    .with_message("Building batches")
                    .with_activation_handle(activation_handle.map(str::to_string))
                    .with_triggered_by(triggered_by),
            )
            .await?;
        manager.resume_or_create(instance_key).await?;

        log_run_operation(
            "begin",
            &self.config.orchestration_key,
            Some(instance_key),
            None,
            "started",
            Some(triggered_by),
        );

        Ok(RunHandle {
            instance_key: instance_key.to_string(),
            run_key,
            manager,
            statuses: self.statuses.clone(),
            status,
        })
    }
}

/// A run being built; consumed by `finish` or `fail`
#[derive(Debug)]
pub struct RunHandle {
    instance_key: String,
    run_key: String,
    manager: BatchManager,
    statuses: RunStatusTracker,
    status: RunStatus,
}

impl RunHandle {
    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    /// Run status as of the last write made through this handle
    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub async fn add_work_item(&mut self, item: WorkItem) -> Result<()> {
        self.manager.add_work_item(item).await
    }

    /// Finalize the instance and hand it to the dispatch loop
    #[instrument(skip(self, extra), fields(instance = %self.instance_key))]
    pub async fn finish(mut self, extra: Map<String, Value>) -> Result<RunStatus> {
        let instance = self.manager.finalize_instance(extra).await?;
        let batch_count = instance.batches.len();

        let mut details = Map::new();
        details.insert("batch_count".to_string(), json!(batch_count));

        // The builder's activation ends here; the run stays in progress under dispatch
        let status = self
            .statuses
            .update(
                &self.run_key,
                StatusUpdate::status(RunState::InProgress)
                    .with_message(format!("Dispatching {batch_count} batches"))
                    .with_activation_handle(None)
                    .with_details(details)
                    .with_batches(instance.batches),
            )
            .await?;

        info!(instance = %self.instance_key, batches = batch_count, "Run handed to dispatch");
        Ok(status)
    }

    /// Record a run that could not be built
    pub async fn fail(self, message: impl Into<String>) -> Result<RunStatus> {
        let message = message.into();
        warn!(instance = %self.instance_key, message = %message, "Run failed while building batches");
        self.statuses
            .update(
                &self.run_key,
                StatusUpdate::status(RunState::Failed).with_message(message),
            )
            .await
    }
}
