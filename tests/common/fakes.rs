//! Scripted stand-ins for the external capabilities: worker triggers,
//! activation host, bulk job API and promote stage.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use promote_core::bulk::{BulkJobApi, BulkOperation, JobDetails, JobResource};
use promote_core::error::{BulkApiError, PromoteError, Result};
use promote_core::status::{ActivationHost, ActivationLiveness};
use promote_core::worker::{PromoteStage, StageError};
use promote_core::{BatchWorker, WorkItem, WorkerRequest, WorkerTrigger};

/// Records every invocation and hands out sequential activation handles
#[derive(Debug, Default)]
pub struct RecordingTrigger {
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingTrigger {
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn requests(&self) -> Vec<WorkerRequest> {
        self.calls()
            .into_iter()
            .map(|(_, params)| WorkerRequest::from_params(params).unwrap())
            .collect()
    }
}

#[async_trait]
impl WorkerTrigger for RecordingTrigger {
    async fn invoke(&self, worker_name: &str, params: Value) -> Result<String> {
        let mut calls = self.calls.lock();
        calls.push((worker_name.to_string(), params));
        Ok(format!("act-{}", calls.len()))
    }
}

/// Runs the batch worker to completion before handing back its activation handle
#[derive(Debug)]
pub struct InlineTrigger {
    worker: BatchWorker,
    prefix: String,
    invocations: Mutex<u32>,
}

impl InlineTrigger {
    pub fn new(worker: BatchWorker, prefix: &str) -> Self {
        Self {
            worker,
            prefix: prefix.to_string(),
            invocations: Mutex::new(0),
        }
    }
}

#[async_trait]
impl WorkerTrigger for InlineTrigger {
    async fn invoke(&self, _worker_name: &str, params: Value) -> Result<String> {
        let request = WorkerRequest::from_params(params)?;
        let handle = {
            let mut invocations = self.invocations.lock();
            *invocations += 1;
            format!("{}-{}", self.prefix, *invocations)
        };
        self.worker
            .execute(&request.instance_key, request.batch_number, Some(&handle))
            .await?;
        Ok(handle)
    }
}

/// Activation host with per-handle answers and a default for unknown handles
#[derive(Debug)]
pub struct ScriptedHost {
    answers: Mutex<HashMap<String, ActivationLiveness>>,
    default: Mutex<ActivationLiveness>,
    failing: Mutex<bool>,
}

impl ScriptedHost {
    pub fn new(default: ActivationLiveness) -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            default: Mutex::new(default),
            failing: Mutex::new(false),
        }
    }

    pub fn set(&self, activation_handle: &str, liveness: ActivationLiveness) {
        self.answers
            .lock()
            .insert(activation_handle.to_string(), liveness);
    }

    pub fn set_default(&self, liveness: ActivationLiveness) {
        *self.default.lock() = liveness;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl ActivationHost for ScriptedHost {
    async fn is_active(&self, activation_handle: &str) -> Result<ActivationLiveness> {
        if *self.failing.lock() {
            return Err(PromoteError::Activation("host unreachable".to_string()));
        }
        Ok(self
            .answers
            .lock()
            .get(activation_handle)
            .copied()
            .unwrap_or(*self.default.lock()))
    }
}

/// Bulk job API whose jobs stop on the first poll.
///
/// Every submitted path reports 200 unless listed as failing for that
/// operation, in which case it reports 500.
#[derive(Debug, Default)]
pub struct ScriptedBulkApi {
    failing: Mutex<HashMap<BulkOperation, HashSet<String>>>,
    reject_submits: Mutex<Option<BulkApiError>>,
    jobs: Mutex<HashMap<String, (BulkOperation, Vec<String>)>>,
    submissions: Mutex<Vec<(BulkOperation, Vec<String>)>>,
}

impl ScriptedBulkApi {
    pub fn fail_path(&self, operation: BulkOperation, path: &str) {
        self.failing
            .lock()
            .entry(operation)
            .or_default()
            .insert(path.to_string());
    }

    pub fn reject_submits(&self, error: BulkApiError) {
        *self.reject_submits.lock() = Some(error);
    }

    pub fn submissions(&self) -> Vec<(BulkOperation, Vec<String>)> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl BulkJobApi for ScriptedBulkApi {
    async fn submit_job(
        &self,
        paths: &[String],
        operation: BulkOperation,
    ) -> std::result::Result<String, BulkApiError> {
        if let Some(error) = self.reject_submits.lock().clone() {
            return Err(error);
        }
        self.submissions.lock().push((operation, paths.to_vec()));
        let mut jobs = self.jobs.lock();
        let job_id = format!("job-{}", jobs.len() + 1);
        jobs.insert(job_id.clone(), (operation, paths.to_vec()));
        Ok(job_id)
    }

    async fn job_details(
        &self,
        job_id: &str,
        _operation: BulkOperation,
    ) -> std::result::Result<JobDetails, BulkApiError> {
        let Some((operation, paths)) = self.jobs.lock().get(job_id).cloned() else {
            return Err(BulkApiError::Http {
                status: 404,
                message: format!("unknown job {job_id}"),
            });
        };
        let failing = self
            .failing
            .lock()
            .get(&operation)
            .cloned()
            .unwrap_or_default();
        Ok(JobDetails {
            state: "stopped".to_string(),
            resources: paths
                .into_iter()
                .map(|path| {
                    let status = if failing.contains(&path) { 500 } else { 200 };
                    JobResource { path, status }
                })
                .collect(),
        })
    }
}

/// Promote stage that replays scripted errors per path, then succeeds
#[derive(Debug, Default)]
pub struct ScriptedStage {
    errors: Mutex<HashMap<String, Vec<StageError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedStage {
    pub fn fail_with(&self, path: &str, errors: Vec<StageError>) {
        self.errors.lock().insert(path.to_string(), errors);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PromoteStage for ScriptedStage {
    async fn promote(&self, item: &WorkItem) -> std::result::Result<(), StageError> {
        self.calls.lock().push(item.path.clone());
        let mut errors = self.errors.lock();
        match errors.get_mut(&item.path) {
            Some(queue) if !queue.is_empty() => Err(queue.remove(0)),
            _ => Ok(()),
        }
    }
}
