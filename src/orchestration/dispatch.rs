//! # Dispatch-and-Track Loop
//!
//! Advances the first eligible instance by at most one step per tick: trigger
//! the next undispatched batch, or check outstanding batches, or aggregate
//! results once every batch is done. All decisions are re-derived from
//! persisted state, so a tick can be re-run after a crash.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::{discard_run_state, WorkerRequest, WorkerTrigger};
use crate::batch::{AggregateResults, BatchEntry, BatchManager, BatchResults, Instance};
use crate::config::PromoteConfig;
use crate::error::{PromoteError, Result};
use crate::logging::log_run_operation;
use crate::status::{
    batch_status_key, run_status_key, ActivationLiveness, LivenessProbe, LivenessVerdict,
    RunState, RunStatusTracker, StatusUpdate,
};
use crate::storage::BlobStore;

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No instance is eligible for dispatch
    Idle,
    /// A worker was triggered for one batch
    Dispatched {
        instance_key: String,
        batch_number: u32,
        activation_handle: String,
    },
    /// Every batch is dispatched and some are still running
    InProgress {
        instance_key: String,
        pending: Vec<u32>,
    },
    /// All batches finished and results were aggregated
    Completed {
        instance_key: String,
        status: RunState,
        results: AggregateResults,
    },
    /// The instance could not be processed and was made terminal
    Failed {
        instance_key: String,
        message: String,
    },
}

/// Batch classification gathered while checking outstanding work
enum BatchCheck {
    Pending(u32),
    Finished(u32),
    Abandoned(u32),
}

#[derive(Debug)]
pub struct DispatchLoop {
    config: Arc<PromoteConfig>,
    manager: BatchManager,
    statuses: RunStatusTracker,
    probe: LivenessProbe,
    trigger: Arc<dyn WorkerTrigger>,
}

impl DispatchLoop {
    pub fn new(
        config: Arc<PromoteConfig>,
        store: Arc<dyn BlobStore>,
        statuses: RunStatusTracker,
        probe: LivenessProbe,
        trigger: Arc<dyn WorkerTrigger>,
    ) -> Self {
        let manager = BatchManager::new(Arc::clone(&config), store);
        Self {
            config,
            manager,
            statuses,
            probe,
            trigger,
        }
    }

    pub fn manager(&self) -> &BatchManager {
        &self.manager
    }

    fn run_key(&self, instance_key: &str) -> String {
        run_status_key(&self.config.orchestration_key, instance_key)
    }

    fn batch_key(&self, instance_key: &str, batch_number: u32) -> String {
        batch_status_key(&self.config.orchestration_key, instance_key, batch_number)
    }

    #[instrument(skip(self), fields(orchestration_key = %self.config.orchestration_key))]
    pub async fn tick(&self) -> Result<TickOutcome> {
        let Some(instance_key) = self.manager.next_instance_to_dispatch().await? else {
            debug!("No instance eligible for dispatch");
            return Ok(TickOutcome::Idle);
        };

        let instance = match self.manager.load_instance(&instance_key).await {
            Ok(instance) => instance,
            Err(err @ PromoteError::MissingInstance { .. }) => {
                return self.fail_instance(&instance_key, &err).await;
            }
            Err(err) => return Err(err),
        };

        if let Some(batch_number) = instance.next_undispatched() {
            return self.dispatch(&instance, batch_number).await;
        }

        self.track(instance).await
    }

    async fn dispatch(&self, instance: &Instance, batch_number: u32) -> Result<TickOutcome> {
        // Fresh batch record before the trigger; the worker may finish before invoke returns
        self.statuses
            .reset(
                &self.batch_key(&instance.key, batch_number),
                StatusUpdate::new().with_triggered_by(&self.config.orchestration_key),
            )
            .await?;

        let request =
            WorkerRequest::new(&self.config.orchestration_key, &instance.key, batch_number);
        let activation_handle = self
            .trigger
            .invoke(&self.config.worker_name, request.to_params()?)
            .await?;

        let instance = self
            .manager
            .record_dispatch(&instance.key, batch_number, &activation_handle)
            .await?;

        self.statuses
            .update(
                &self.run_key(&instance.key),
                StatusUpdate::status(RunState::InProgress)
                    .with_message(format!(
                        "Dispatched batch {batch_number} of {}",
                        instance.batches.len()
                    ))
                    .with_batches(instance.batches.clone()),
            )
            .await?;

        log_run_operation(
            "dispatch",
            &self.config.orchestration_key,
            Some(&instance.key),
            Some(batch_number),
            "dispatched",
            Some(&activation_handle),
        );

        Ok(TickOutcome::Dispatched {
            instance_key: instance.key.clone(),
            batch_number,
            activation_handle,
        })
    }

    async fn track(&self, instance: Instance) -> Result<TickOutcome> {
        let mut checks = Vec::new();
        for entry in instance.outstanding() {
            let check = self
                .check_batch(&instance.key, entry.number, entry.activation_handle.as_deref())
                .await?;
            checks.push(check);
        }

        let mut pending = Vec::new();
        let mut finished = Vec::new();
        for check in checks {
            match check {
                BatchCheck::Pending(number) => pending.push(number),
                BatchCheck::Finished(number) => finished.push((number, false)),
                BatchCheck::Abandoned(number) => finished.push((number, true)),
            }
        }

        let instance = if finished.is_empty() {
            instance
        } else {
            let instance = self
                .manager
                .mark_batches_done(&instance.key, &finished)
                .await?;
            self.statuses
                .update(
                    &self.run_key(&instance.key),
                    StatusUpdate::new().with_batches(instance.batches.clone()),
                )
                .await?;
            instance
        };

        if instance.all_done() {
            return self.complete(instance).await;
        }

        debug!(instance = %instance.key, pending = ?pending, "Batches still running");
        Ok(TickOutcome::InProgress {
            instance_key: instance.key,
            pending,
        })
    }

    async fn check_batch(
        &self,
        instance_key: &str,
        batch_number: u32,
        activation_handle: Option<&str>,
    ) -> Result<BatchCheck> {
        let status = self
            .statuses
            .get(&self.batch_key(instance_key, batch_number))
            .await?;

        if status.status == RunState::Failed {
            warn!(instance = %instance_key, batch = batch_number, message = ?status.message, "Batch worker failed");
            return Ok(BatchCheck::Abandoned(batch_number));
        }
        if status.status.is_finished() {
            return Ok(BatchCheck::Finished(batch_number));
        }

        if status.status.is_in_progress() {
            return Ok(match self.probe.check(&status, activation_handle).await? {
                LivenessVerdict::Running => BatchCheck::Pending(batch_number),
                LivenessVerdict::Stale | LivenessVerdict::NotRunning => {
                    BatchCheck::Abandoned(batch_number)
                }
            });
        }

        // Triggered but the worker has not written a status yet
        let Some(handle) = activation_handle else {
            return Ok(BatchCheck::Pending(batch_number));
        };
        match self.probe.activation(handle).await? {
            ActivationLiveness::Active => Ok(BatchCheck::Pending(batch_number)),
            liveness => {
                warn!(
                    instance = %instance_key,
                    batch = batch_number,
                    activation = %handle,
                    liveness = ?liveness,
                    "Batch worker gone before reporting status"
                );
                Ok(BatchCheck::Abandoned(batch_number))
            }
        }
    }

    async fn complete(&self, instance: Instance) -> Result<TickOutcome> {
        let per_batch = try_join_all(
            instance
                .batches
                .iter()
                .map(|entry| self.batch_results(&instance.key, entry)),
        )
        .await?;

        let mut aggregate = AggregateResults {
            batch_count: instance.batches.len(),
            abandoned_batches: instance
                .batches
                .iter()
                .filter(|entry| entry.abandoned)
                .map(|entry| entry.number)
                .collect(),
            ..Default::default()
        };
        for results in per_batch {
            aggregate.failures.absorb(results);
        }

        let (state, message) = if aggregate.is_clean() {
            (
                RunState::Completed,
                format!("Completed {} batches", aggregate.batch_count),
            )
        } else {
            (
                RunState::CompletedWithError,
                format!(
                    "Completed {} batches with {} failed paths",
                    aggregate.batch_count,
                    aggregate.failures.failure_count()
                ),
            )
        };

        self.statuses
            .update(
                &self.run_key(&instance.key),
                StatusUpdate::status(state)
                    .with_message(message)
                    .with_details(aggregate.to_details())
                    .with_batches(instance.batches.clone()),
            )
            .await?;
        self.manager
            .mark_complete(&instance.key, Some(&aggregate))
            .await?;

        info!(
            instance = %instance.key,
            status = %state,
            batches = aggregate.batch_count,
            failures = aggregate.failures.failure_count(),
            abandoned = aggregate.abandoned_batches.len(),
            "Run completed"
        );

        Ok(TickOutcome::Completed {
            instance_key: instance.key,
            status: state,
            results: aggregate,
        })
    }

    /// Results file of one batch; an abandoned batch without one fails all its items
    async fn batch_results(&self, instance_key: &str, entry: &BatchEntry) -> Result<BatchResults> {
        let batch = self.manager.open_batch(instance_key, entry.number).await?;
        if let Some(results) = batch.read_results().await? {
            return Ok(results);
        }
        if !entry.abandoned {
            return Ok(BatchResults::default());
        }
        let failed_promotes = batch
            .items()
            .await?
            .into_iter()
            .map(|item| item.path)
            .collect();
        Ok(BatchResults {
            failed_promotes,
            ..Default::default()
        })
    }

    /// Make an instance that cannot be processed terminal instead of retrying it every tick
    async fn fail_instance(&self, instance_key: &str, err: &PromoteError) -> Result<TickOutcome> {
        error!(instance = %instance_key, error = %err, "Fatal orchestration error, failing run");
        let message = err.to_string();
        self.statuses
            .update(
                &self.run_key(instance_key),
                StatusUpdate::status(RunState::Failed).with_message(&message),
            )
            .await?;
        self.manager.mark_complete(instance_key, None).await?;

        Ok(TickOutcome::Failed {
            instance_key: instance_key.to_string(),
            message,
        })
    }

    /// Maintenance: discard every persisted trace of an instance's run
    #[instrument(skip(self))]
    pub async fn abandon(&mut self, instance_key: &str) -> Result<()> {
        discard_run_state(
            &mut self.manager,
            &self.statuses,
            &self.config.orchestration_key,
            instance_key,
        )
        .await?;
        log_run_operation(
            "abandon",
            &self.config.orchestration_key,
            Some(instance_key),
            None,
            "discarded",
            None,
        );
        Ok(())
    }
}
