//! # Bulk Jobs
//!
//! Preview and publish run as asynchronous jobs on an external API. The core
//! only drives the polling contract: submit a path list, poll the job until it
//! stops or the attempt budget runs out, and turn the per-path status codes
//! into success/failure.

mod poller;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::SUCCESS_STATUS_CODES;
use crate::error::BulkApiError;

pub use poller::{BulkJobPoller, PollOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperation {
    Preview,
    Publish,
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preview => write!(f, "preview"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// One path's outcome as reported by a job status response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResource {
    pub path: String,
    pub status: u16,
}

impl JobResource {
    pub fn is_success(&self) -> bool {
        SUCCESS_STATUS_CODES.contains(&self.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    pub state: String,
    #[serde(default)]
    pub resources: Vec<JobResource>,
}

/// Submitted job plus the paths it was asked to process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub operation: BulkOperation,
    pub paths: Vec<String>,
}

/// Preview/publish job API
#[async_trait]
pub trait BulkJobApi: Send + Sync + fmt::Debug {
    async fn submit_job(
        &self,
        paths: &[String],
        operation: BulkOperation,
    ) -> Result<String, BulkApiError>;

    async fn job_details(
        &self,
        job_id: &str,
        operation: BulkOperation,
    ) -> Result<JobDetails, BulkApiError>;
}
