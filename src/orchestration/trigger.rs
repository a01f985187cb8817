use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::error::Result;

/// Parameters handed to a batch worker activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub orchestration_key: String,
    pub instance_key: String,
    pub batch_number: u32,
}

impl WorkerRequest {
    pub fn new(
        orchestration_key: impl Into<String>,
        instance_key: impl Into<String>,
        batch_number: u32,
    ) -> Self {
        Self {
            orchestration_key: orchestration_key.into(),
            instance_key: instance_key.into(),
            batch_number,
        }
    }

    pub fn to_params(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_params(params: Value) -> Result<Self> {
        Ok(serde_json::from_value(params)?)
    }
}

/// Fire-and-forget invocation of a named worker.
///
/// Returns the activation handle of the started execution without waiting
/// for it to finish.
#[async_trait]
pub trait WorkerTrigger: Send + Sync + Debug {
    async fn invoke(&self, worker_name: &str, params: Value) -> Result<String>;
}
