//! # Batching
//!
//! Work items are sharded into fixed-capacity batches that are persisted under
//! an instance directory. The [`BatchManager`] owns the tracker and instance
//! files; [`Batch`] owns one shard's item list and results.

mod instance;
mod manager;
mod results;
mod shard;
mod work_item;

pub use instance::{instance_key_for, BatchEntry, Instance, RunTracker, TrackerEntry};
pub use manager::BatchManager;
pub use results::{AggregateResults, BatchResults};
pub use shard::Batch;
pub use work_item::WorkItem;
