#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Promote Core
//!
//! Batch orchestration and run-status tracking for bulk "promote" pipelines:
//! copy, preview and publish an unbounded set of documents through rate-limited
//! external services using short-lived, independently triggered workers.
//!
//! ## Overview
//!
//! Work items are sharded into fixed-capacity batches and persisted through a
//! [`storage::BlobStore`]. A dispatch loop, invoked repeatedly by an external
//! scheduler, triggers one worker per batch, tracks each batch's status record,
//! and aggregates per-path failures once every batch is done. No process stays
//! alive across a run; every decision is re-derived from persisted state.
//!
//! ## Module Organization
//!
//! - [`batch`] - Work items, batches, instances, the run tracker, and [`BatchManager`]
//! - [`status`] - Run status records, the status state machine, and the liveness probe
//! - [`orchestration`] - [`RunLauncher`] and the [`DispatchLoop`]
//! - [`worker`] - [`BatchWorker`], which executes one dispatched batch
//! - [`bulk`] - Bounded polling of asynchronous preview/publish jobs
//! - [`resilience`] - Bounded retry with fixed or exponential backoff
//! - [`storage`] - Blob store capability with in-memory and filesystem backends
//! - [`config`] - Explicit per-run configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use promote_core::config::PromoteConfig;
//! use promote_core::storage::InMemoryBlobStore;
//! use promote_core::{BatchManager, WorkItem};
//!
//! # async fn example() -> promote_core::Result<()> {
//! let config = Arc::new(PromoteConfig::new("promote", "promote-worker", "/var/lib/promote"));
//! config.validate()?;
//!
//! let mut manager = BatchManager::new(config, Arc::new(InMemoryBlobStore::new()));
//! manager.resume_or_create("drafts_site").await?;
//! manager.add_work_item(WorkItem::new("dl-1", "/site/index")).await?;
//! manager.finalize_instance(Default::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Consistency
//!
//! Tracker, instance and status records are read-modify-write with no lock or
//! version check. "At most one active run per target" is best effort; callers
//! that need strict single flight must add an external lease.

pub mod batch;
pub mod bulk;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod resilience;
pub mod status;
pub mod storage;
pub mod worker;

pub use batch::{
    instance_key_for, AggregateResults, Batch, BatchEntry, BatchManager, BatchResults, Instance,
    RunTracker, TrackerEntry, WorkItem,
};
pub use bulk::{BulkJobApi, BulkJobPoller, BulkOperation, JobDetails, JobHandle, PollOutcome};
pub use config::{BackoffConfig, BulkJobConfig, ConfigManager, PromoteConfig};
pub use error::{BulkApiError, PromoteError, Result};
pub use orchestration::{
    DispatchLoop, RunHandle, RunLauncher, TickOutcome, WorkerRequest, WorkerTrigger,
};
pub use resilience::RetryPolicy;
pub use status::{
    ActivationHost, ActivationLiveness, InMemoryStatusStore, LivenessProbe, LivenessVerdict,
    RunState, RunStatus, RunStatusTracker, StatusStore, StatusUpdate,
};
pub use storage::{BlobStore, FileSystemBlobStore, InMemoryBlobStore, StoreLayout};
pub use worker::{BatchWorker, PromoteStage, StageError};
