//! # Orchestration
//!
//! Control flow around the persisted batch state:
//!
//! - [`RunLauncher`] starts a run for one target and builds its batches
//! - [`DispatchLoop`] is invoked repeatedly by an external scheduler and
//!   advances one instance by one step per tick
//! - [`WorkerTrigger`] is the fire-and-forget capability that starts a batch worker
//!
//! There is no lock or version check on the tracker, instance, or status
//! records. Overlapping ticks can both trigger the same batch; workers are
//! idempotent per batch, so this costs duplicate work but not correctness.

pub mod dispatch;
pub mod launcher;
pub mod trigger;

use std::collections::BTreeSet;
use tracing::debug;

use crate::batch::BatchManager;
use crate::error::{PromoteError, Result};
use crate::status::{batch_status_key, run_status_key, RunStatusTracker};

pub use dispatch::{DispatchLoop, TickOutcome};
pub use launcher::{RunHandle, RunLauncher};
pub use trigger::{WorkerRequest, WorkerTrigger};

/// Delete an instance's files, tracker entry, and every run and batch status record
pub(crate) async fn discard_run_state(
    manager: &mut BatchManager,
    statuses: &RunStatusTracker,
    orchestration_key: &str,
    instance_key: &str,
) -> Result<()> {
    let run_key = run_status_key(orchestration_key, instance_key);

    let mut batch_numbers = BTreeSet::new();
    match manager.load_instance(instance_key).await {
        Ok(instance) => batch_numbers.extend(instance.batches.iter().map(|b| b.number)),
        Err(PromoteError::MissingInstance { .. }) => {}
        Err(err) => return Err(err),
    }
    let status = statuses.get(&run_key).await?;
    batch_numbers.extend(status.batches.iter().map(|b| b.number));

    for number in &batch_numbers {
        statuses
            .delete(&batch_status_key(orchestration_key, instance_key, *number))
            .await?;
    }
    statuses.delete(&run_key).await?;
    manager.cleanup_instance(instance_key).await?;

    debug!(
        instance = %instance_key,
        batch_statuses = batch_numbers.len(),
        "Run state discarded"
    );
    Ok(())
}
