//! # Batch Worker
//!
//! Executes one dispatched batch end to end: promote every item, preview the
//! promoted paths, publish the previewed ones, and write the batch results.
//! Per-path failures are recorded, never raised. The batch status record is
//! the worker's only report back to the dispatch loop.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::batch::{Batch, BatchResults, WorkItem};
use crate::bulk::{BulkJobPoller, BulkOperation};
use crate::config::PromoteConfig;
use crate::error::Result;
use crate::logging::log_error;
use crate::resilience::RetryPolicy;
use crate::status::{batch_status_key, RunState, RunStatusTracker, StatusUpdate};
use crate::storage::{BlobStore, StoreLayout};

/// Failure of the per-item promote (copy) stage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// Rate limiting or a temporary upstream failure
    #[error("Transient stage failure: {0}")]
    Transient(String),
    #[error("Stage failure: {0}")]
    Permanent(String),
}

impl StageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Copies one work item's source document to its destination path
#[async_trait]
pub trait PromoteStage: Send + Sync + Debug {
    async fn promote(&self, item: &WorkItem) -> std::result::Result<(), StageError>;
}

#[derive(Debug)]
pub struct BatchWorker {
    config: Arc<PromoteConfig>,
    store: Arc<dyn BlobStore>,
    layout: StoreLayout,
    statuses: RunStatusTracker,
    stage: Arc<dyn PromoteStage>,
    poller: BulkJobPoller,
}

impl BatchWorker {
    pub fn new(
        config: Arc<PromoteConfig>,
        store: Arc<dyn BlobStore>,
        statuses: RunStatusTracker,
        stage: Arc<dyn PromoteStage>,
        poller: BulkJobPoller,
    ) -> Self {
        let layout = StoreLayout::new(&config.storage_root, &config.orchestration_key);
        Self {
            config,
            store,
            layout,
            statuses,
            stage,
            poller,
        }
    }

    /// Run batch `batch_number` of `instance_key`.
    ///
    /// A batch whose results file already exists is not re-run; its stored
    /// results are returned and its terminal status is written again. A bulk
    /// job that cannot be submitted fails every path it covers. On a storage
    /// failure the batch status is set FAILED and the error is returned.
    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        instance_key: &str,
        batch_number: u32,
        activation_handle: Option<&str>,
    ) -> Result<BatchResults> {
        let status_key =
            batch_status_key(&self.config.orchestration_key, instance_key, batch_number);

        match self
            .run(instance_key, batch_number, activation_handle, &status_key)
            .await
        {
            Ok(results) => Ok(results),
            Err(err) => {
                log_error(
                    "batch_worker",
                    "execute",
                    &err.to_string(),
                    Some(&status_key),
                );
                if let Err(status_err) = self
                    .statuses
                    .update(
                        &status_key,
                        StatusUpdate::status(RunState::Failed).with_message(err.to_string()),
                    )
                    .await
                {
                    warn!(error = %status_err, "Could not record batch failure");
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        instance_key: &str,
        batch_number: u32,
        activation_handle: Option<&str>,
        status_key: &str,
    ) -> Result<BatchResults> {
        let batch = Batch::open(
            batch_number,
            self.config.batch_capacity,
            Arc::clone(&self.store),
            &self.layout,
            instance_key,
        )
        .await?;

        if let Some(results) = batch.read_results().await? {
            info!(instance = %instance_key, batch = batch_number, "Batch already has results, skipping");
            // A re-dispatch reset the batch record; report the stored outcome again
            let items = batch.items().await?;
            self.statuses
                .update(status_key, self.started(activation_handle))
                .await?;
            self.finish(status_key, &items, &results).await?;
            return Ok(results);
        }

        self.statuses
            .update(status_key, self.started(activation_handle))
            .await?;

        let items = batch.items().await?;
        self.statuses
            .update(
                status_key,
                StatusUpdate::status(RunState::InProgress)
                    .with_message(format!("Promoting {} items", items.len())),
            )
            .await?;

        let mut results = BatchResults::default();

        let promoted = self.promote_all(&items, &mut results).await;

        let previewed = if promoted.is_empty() {
            Vec::new()
        } else {
            let outcome = self.bulk_stage(&promoted, BulkOperation::Preview).await;
            results.failed_previews = outcome.failed;
            outcome.succeeded
        };

        if self.config.publish_enabled && !previewed.is_empty() {
            let outcome = self.bulk_stage(&previewed, BulkOperation::Publish).await;
            results.failed_publishes = outcome.failed;
        }

        batch.write_results(&results).await?;
        let state = self.finish(status_key, &items, &results).await?;

        info!(
            instance = %instance_key,
            batch = batch_number,
            status = %state,
            failures = results.failure_count(),
            "Batch finished"
        );
        Ok(results)
    }

    fn started(&self, activation_handle: Option<&str>) -> StatusUpdate {
        let started =
            StatusUpdate::status(RunState::Started).with_triggered_by(&self.config.worker_name);
        match activation_handle {
            Some(handle) => started.with_activation_handle(Some(handle.to_string())),
            None => started,
        }
    }

    /// Write the terminal batch status derived from `results`
    async fn finish(
        &self,
        status_key: &str,
        items: &[WorkItem],
        results: &BatchResults,
    ) -> Result<RunState> {
        let state = if results.is_clean() {
            RunState::Completed
        } else {
            RunState::CompletedWithError
        };
        self.statuses
            .update(
                status_key,
                StatusUpdate::status(state)
                    .with_message(format!(
                        "Processed {} items with {} failures",
                        items.len(),
                        results.failure_count()
                    ))
                    .with_details(details(items, results)),
            )
            .await?;
        Ok(state)
    }

    /// Submit and poll one bulk job; a job that cannot be submitted fails every path
    async fn bulk_stage(&self, paths: &[String], operation: BulkOperation) -> StageOutcome {
        match self.poller.run(paths, operation).await {
            Ok(outcome) => StageOutcome {
                succeeded: outcome.succeeded(),
                failed: outcome.failed(),
            },
            Err(err) => {
                warn!(
                    operation = %operation,
                    paths = paths.len(),
                    error = %err,
                    "Bulk job submission failed, recording every path as failed"
                );
                StageOutcome {
                    succeeded: Vec::new(),
                    failed: paths.to_vec(),
                }
            }
        }
    }

    /// Promote each item, retrying transient failures; returns promoted paths
    async fn promote_all(&self, items: &[WorkItem], results: &mut BatchResults) -> Vec<String> {
        let policy = RetryPolicy::new("promote_stage", self.config.stage_retry.clone());
        let mut promoted = Vec::with_capacity(items.len());

        for item in items {
            match policy
                .execute(|_| self.stage.promote(item), StageError::is_transient)
                .await
            {
                Ok(()) => {
                    debug!(path = %item.path, "Item promoted");
                    promoted.push(item.path.clone());
                }
                Err(err) => {
                    warn!(path = %item.path, error = %err, "Item promote failed");
                    results.failed_promotes.push(item.path.clone());
                }
            }
        }
        promoted
    }
}

/// Paths that made it through one bulk stage
struct StageOutcome {
    succeeded: Vec<String>,
    failed: Vec<String>,
}

fn details(items: &[WorkItem], results: &BatchResults) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("item_count".to_string(), json!(items.len()));
    details.insert("failed_promotes".to_string(), json!(results.failed_promotes));
    details.insert("failed_previews".to_string(), json!(results.failed_previews));
    details.insert("failed_publishes".to_string(), json!(results.failed_publishes));
    details
}
