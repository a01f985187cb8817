#![allow(dead_code)]

pub mod fakes;
pub mod strategies;

pub use fakes::*;
pub use strategies::*;

use serde_json::Map;
use std::sync::Arc;
use std::time::Duration;

use promote_core::bulk::BulkJobPoller;
use promote_core::config::{BackoffConfig, PromoteConfig};
use promote_core::status::{
    batch_status_key, run_status_key, ActivationLiveness, InMemoryStatusStore, LivenessProbe,
    RunStatus, RunStatusTracker,
};
use promote_core::storage::InMemoryBlobStore;
use promote_core::{BatchWorker, DispatchLoop, RunLauncher, WorkItem, WorkerTrigger};

pub const ORCHESTRATION_KEY: &str = "promote";
pub const WORKER_NAME: &str = "promote-batch-worker";

/// Shared in-memory stores and scripted collaborators for one test
#[derive(Debug)]
pub struct Harness {
    pub config: Arc<PromoteConfig>,
    pub store: InMemoryBlobStore,
    pub status_store: InMemoryStatusStore,
    pub statuses: RunStatusTracker,
    pub trigger: Arc<RecordingTrigger>,
    pub host: Arc<ScriptedHost>,
    pub api: Arc<ScriptedBulkApi>,
    pub stage: Arc<ScriptedStage>,
}

impl Harness {
    pub fn new(batch_capacity: usize) -> Self {
        Self::with_config(|config| config.batch_capacity = batch_capacity)
    }

    pub fn with_config(configure: impl FnOnce(&mut PromoteConfig)) -> Self {
        let mut config = PromoteConfig::new(ORCHESTRATION_KEY, WORKER_NAME, "/state");
        config.stage_retry = BackoffConfig::fixed(3, 10);
        config.bulk.submit_delay_ms = 10;
        config.bulk.poll_interval_seconds = 1;
        configure(&mut config);

        let status_store = InMemoryStatusStore::new();
        let statuses = RunStatusTracker::new(Arc::new(status_store.clone()), Duration::from_secs(3600));

        Self {
            config: Arc::new(config),
            store: InMemoryBlobStore::new(),
            status_store,
            statuses,
            trigger: Arc::new(RecordingTrigger::default()),
            host: Arc::new(ScriptedHost::new(ActivationLiveness::Active)),
            api: Arc::new(ScriptedBulkApi::default()),
            stage: Arc::new(ScriptedStage::default()),
        }
    }

    pub fn probe(&self) -> LivenessProbe {
        LivenessProbe::new(self.host.clone())
    }

    pub fn launcher(&self) -> RunLauncher {
        RunLauncher::new(
            Arc::clone(&self.config),
            Arc::new(self.store.clone()),
            self.statuses.clone(),
            self.probe(),
        )
    }

    pub fn dispatch_loop(&self) -> DispatchLoop {
        self.dispatch_loop_with(self.trigger.clone())
    }

    pub fn dispatch_loop_with(&self, trigger: Arc<dyn WorkerTrigger>) -> DispatchLoop {
        DispatchLoop::new(
            Arc::clone(&self.config),
            Arc::new(self.store.clone()),
            self.statuses.clone(),
            self.probe(),
            trigger,
        )
    }

    pub fn worker(&self) -> BatchWorker {
        BatchWorker::new(
            Arc::clone(&self.config),
            Arc::new(self.store.clone()),
            self.statuses.clone(),
            self.stage.clone(),
            BulkJobPoller::new(self.api.clone(), self.config.bulk.clone()),
        )
    }

    /// Build and finalize a run whose items have the given destination paths
    pub async fn build_run(&self, instance_key: &str, paths: &[&str]) -> RunStatus {
        let mut run = self
            .launcher()
            .begin(instance_key, "test", Some("builder-1"))
            .await
            .unwrap();
        for path in paths {
            run.add_work_item(item(path)).await.unwrap();
        }
        run.finish(Map::new()).await.unwrap()
    }

    pub async fn run_status(&self, instance_key: &str) -> RunStatus {
        self.statuses
            .get(&run_status_key(ORCHESTRATION_KEY, instance_key))
            .await
            .unwrap()
    }

    pub async fn batch_status(&self, instance_key: &str, batch_number: u32) -> RunStatus {
        self.statuses
            .get(&batch_status_key(ORCHESTRATION_KEY, instance_key, batch_number))
            .await
            .unwrap()
    }
}

pub fn item(path: &str) -> WorkItem {
    WorkItem::new(format!("download:{path}"), path)
}
