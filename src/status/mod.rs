//! # Run Status
//!
//! Consumer-facing status records for runs and batches, kept apart from the
//! instance/batch bookkeeping so "is it alive?" never touches batch files.
//!
//! States move `NOT_STARTED -> STARTED|IN_PROGRESS -> {COMPLETED,
//! COMPLETED_WITH_ERROR, FAILED}`. No transition table is enforced; the only
//! rules are the start/end timestamp backfills in [`RunStatus::apply`].

mod liveness;
mod record;
mod states;
mod store;
mod tracker;

pub use liveness::{ActivationHost, ActivationLiveness, LivenessProbe, LivenessVerdict};
pub use record::{RunStatus, StatusUpdate};
pub use states::RunState;
pub use store::{InMemoryStatusStore, StatusStore, StoredValue};
pub use tracker::{batch_status_key, run_status_key, status_hash, RunStatusTracker};

/// Started or in progress
pub fn is_in_progress(state: RunState) -> bool {
    state.is_in_progress()
}

/// Completed, completed with error, or failed
pub fn is_finished(state: RunState) -> bool {
    state.is_finished()
}
