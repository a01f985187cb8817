//! # Promote Configuration
//!
//! Explicit configuration constructed once per run and handed to every
//! component constructor as `Arc<PromoteConfig>`. Nothing in the crate reads
//! configuration from a global.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use promote_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(Some("config/promote.toml".as_ref()))?;
//! let capacity = manager.config().batch_capacity;
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::defaults;
use crate::error::{PromoteError, Result};

pub use loader::ConfigManager;

/// Root configuration for one orchestration key
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PromoteConfig {
    /// Logical orchestration key (e.g. "promote"); one RunTracker per key
    pub orchestration_key: String,

    /// Name of the worker action triggered once per batch
    pub worker_name: String,

    /// Root path/prefix under which tracker, instance and batch files live
    pub storage_root: String,

    /// Maximum number of work items per batch
    pub batch_capacity: usize,

    /// Retention window for run status records
    pub status_ttl_seconds: u64,

    /// When false the batch worker stops after preview
    pub publish_enabled: bool,

    /// Bulk preview/publish job submission and polling budgets
    pub bulk: BulkJobConfig,

    /// Retry budget for transient per-item promote failures
    pub stage_retry: BackoffConfig,
}

impl Default for PromoteConfig {
    fn default() -> Self {
        Self {
            orchestration_key: defaults::ORCHESTRATION_KEY.to_string(),
            worker_name: String::new(),
            storage_root: String::new(),
            batch_capacity: defaults::BATCH_CAPACITY,
            status_ttl_seconds: defaults::STATUS_TTL_SECONDS,
            publish_enabled: true,
            bulk: BulkJobConfig::default(),
            stage_retry: BackoffConfig::default(),
        }
    }
}

impl PromoteConfig {
    /// Configuration with the required parameters set and defaults elsewhere
    pub fn new(
        orchestration_key: impl Into<String>,
        worker_name: impl Into<String>,
        storage_root: impl Into<String>,
    ) -> Self {
        Self {
            orchestration_key: orchestration_key.into(),
            worker_name: worker_name.into(),
            storage_root: storage_root.into(),
            ..Self::default()
        }
    }

    /// Fail fast on missing or nonsensical orchestration parameters
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("orchestration_key", &self.orchestration_key),
            ("worker_name", &self.worker_name),
            ("storage_root", &self.storage_root),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PromoteError::Configuration(format!(
                    "missing required parameter: {name}"
                )));
            }
        }

        if self.batch_capacity == 0 {
            return Err(PromoteError::Configuration(
                "batch_capacity must be greater than zero".to_string(),
            ));
        }
        if self.bulk.max_poll_attempts == 0 || self.bulk.submit_attempts == 0 {
            return Err(PromoteError::Configuration(
                "bulk job attempt budgets must be greater than zero".to_string(),
            ));
        }
        if self.stage_retry.max_attempts == 0 {
            return Err(PromoteError::Configuration(
                "stage_retry.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.stage_retry.multiplier < 1.0 {
            return Err(PromoteError::Configuration(format!(
                "stage_retry.multiplier must be >= 1.0, got {}",
                self.stage_retry.multiplier
            )));
        }

        Ok(())
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_seconds)
    }
}

/// Bulk preview/publish job budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkJobConfig {
    pub max_poll_attempts: u32,
    pub poll_interval_seconds: u64,
    pub submit_attempts: u32,
    pub submit_delay_ms: u64,
}

impl Default for BulkJobConfig {
    fn default() -> Self {
        Self {
            max_poll_attempts: defaults::MAX_POLL_ATTEMPTS,
            poll_interval_seconds: defaults::POLL_INTERVAL_SECONDS,
            submit_attempts: defaults::SUBMIT_ATTEMPTS,
            submit_delay_ms: defaults::SUBMIT_DELAY_MS,
        }
    }
}

impl BulkJobConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Submission retries use a fixed delay
    pub fn submit_backoff(&self) -> BackoffConfig {
        BackoffConfig::fixed(self.submit_attempts, self.submit_delay_ms)
    }
}

/// Backoff and retry configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// 1.0 gives a fixed delay
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::STAGE_RETRY_ATTEMPTS,
            base_delay_ms: defaults::STAGE_RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::STAGE_RETRY_MAX_DELAY_MS,
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            multiplier: 1.0,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}
