use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{BulkJobApi, BulkOperation, JobHandle};
use crate::config::BulkJobConfig;
use crate::constants::job_states;
use crate::error::BulkApiError;
use crate::resilience::RetryPolicy;

/// Per-path results of polling one job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Every submitted path; `true` on success
    pub results: BTreeMap<String, bool>,
    pub attempts: u32,
    /// The job reported a terminal state before the budget ran out
    pub terminal: bool,
    pub last_state: Option<String>,
}

impl PollOutcome {
    pub fn succeeded(&self) -> Vec<String> {
        self.paths_where(true)
    }

    pub fn failed(&self) -> Vec<String> {
        self.paths_where(false)
    }

    fn paths_where(&self, success: bool) -> Vec<String> {
        self.results
            .iter()
            .filter(|(_, ok)| **ok == success)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

/// Submits bulk jobs and polls them under a bounded attempt budget
#[derive(Debug, Clone)]
pub struct BulkJobPoller {
    api: Arc<dyn BulkJobApi>,
    config: BulkJobConfig,
}

impl BulkJobPoller {
    pub fn new(api: Arc<dyn BulkJobApi>, config: BulkJobConfig) -> Self {
        Self { api, config }
    }

    /// Submit a job, retrying transient failures with a fixed delay.
    /// Auth failures (401/403) are returned immediately.
    #[instrument(skip(self, paths), fields(paths = paths.len()))]
    pub async fn submit(
        &self,
        paths: &[String],
        operation: BulkOperation,
    ) -> Result<JobHandle, BulkApiError> {
        let policy = RetryPolicy::new(
            format!("bulk_{operation}_submit"),
            self.config.submit_backoff(),
        );
        let job_id = policy
            .execute(
                |_| self.api.submit_job(paths, operation),
                BulkApiError::is_transient,
            )
            .await?;

        info!(job_id = %job_id, operation = %operation, paths = paths.len(), "Bulk job submitted");
        Ok(JobHandle {
            job_id,
            operation,
            paths: paths.to_vec(),
        })
    }

    /// Poll until the job stops or `max_attempts` polls have been made.
    ///
    /// Results accumulate across polls: a path keeps its last reported result
    /// when a later response omits it, and once reported successful it stays
    /// successful. Paths never reported are failures.
    #[instrument(skip(self, handle), fields(job_id = %handle.job_id, operation = %handle.operation))]
    pub async fn poll(
        &self,
        handle: &JobHandle,
        max_attempts: u32,
        interval: Duration,
    ) -> PollOutcome {
        let mut outcome = PollOutcome {
            results: handle.paths.iter().map(|p| (p.clone(), false)).collect(),
            ..Default::default()
        };

        while outcome.attempts < max_attempts {
            if outcome.attempts > 0 {
                tokio::time::sleep(interval).await;
            }
            outcome.attempts += 1;

            match self.api.job_details(&handle.job_id, handle.operation).await {
                Ok(details) => {
                    for resource in &details.resources {
                        let ok = resource.is_success();
                        outcome
                            .results
                            .entry(resource.path.clone())
                            .and_modify(|seen| *seen = *seen || ok)
                            .or_insert(ok);
                    }
                    debug!(
                        attempt = outcome.attempts,
                        state = %details.state,
                        reported = details.resources.len(),
                        "Bulk job polled"
                    );
                    let terminal = job_states::is_terminal(&details.state);
                    outcome.last_state = Some(details.state);
                    if terminal {
                        outcome.terminal = true;
                        break;
                    }
                }
                Err(err) if err.is_auth() => {
                    warn!(attempt = outcome.attempts, error = %err, "Bulk job poll rejected, giving up");
                    break;
                }
                Err(err) => {
                    warn!(attempt = outcome.attempts, error = %err, "Bulk job poll failed");
                }
            }
        }

        if !outcome.terminal {
            warn!(
                attempts = outcome.attempts,
                last_state = ?outcome.last_state,
                "Bulk job did not reach a terminal state within the poll budget"
            );
        }
        outcome
    }

    /// Submit then poll with the configured budget
    pub async fn run(
        &self,
        paths: &[String],
        operation: BulkOperation,
    ) -> Result<PollOutcome, BulkApiError> {
        let handle = self.submit(paths, operation).await?;
        Ok(self
            .poll(
                &handle,
                self.config.max_poll_attempts,
                self.config.poll_interval(),
            )
            .await)
    }
}
