//! # System Constants
//!
//! Storage file names, default budgets, and status groupings shared by the
//! batch manager, the dispatch loop, and the batch worker.

pub use crate::status::RunState;

/// File and directory names under `{storage_root}/{orchestration_key}`
pub mod files {
    pub const TRACKER_FILE: &str = "tracker.json";
    pub const INSTANCE_FILE: &str = "instance.json";
    pub const BATCH_INFO_FILE: &str = "batch_info.json";
    pub const RESULTS_FILE: &str = "results.json";
    pub const BATCH_DIR_PREFIX: &str = "batch_";
}

/// Defaults applied when configuration omits a value
pub mod defaults {
    pub const BATCH_CAPACITY: usize = 200;
    /// 30 days
    pub const STATUS_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
    pub const MAX_POLL_ATTEMPTS: u32 = 30;
    pub const POLL_INTERVAL_SECONDS: u64 = 5;
    pub const SUBMIT_ATTEMPTS: u32 = 3;
    pub const SUBMIT_DELAY_MS: u64 = 5_000;
    pub const STAGE_RETRY_ATTEMPTS: u32 = 3;
    pub const STAGE_RETRY_BASE_DELAY_MS: u64 = 1_000;
    pub const STAGE_RETRY_MAX_DELAY_MS: u64 = 30_000;
    pub const ORCHESTRATION_KEY: &str = "promote";
}

/// Bulk job states reported by the preview/publish API
pub mod job_states {
    pub const STOPPED: &str = "stopped";
    pub const CANCELLED: &str = "cancelled";

    /// The job will not report further progress
    pub fn is_terminal(state: &str) -> bool {
        state.eq_ignore_ascii_case(STOPPED) || state.eq_ignore_ascii_case(CANCELLED)
    }
}

/// Per-path HTTP status codes the bulk job API reports as success
pub const SUCCESS_STATUS_CODES: [u16; 2] = [200, 304];

/// Status groupings for orchestration decisions
pub mod status_groups {
    use super::RunState;

    pub const IN_PROGRESS_STATES: &[RunState] = &[RunState::Started, RunState::InProgress];

    pub const FINISHED_STATES: &[RunState] = &[
        RunState::Completed,
        RunState::CompletedWithError,
        RunState::Failed,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_job_states() {
        assert!(job_states::is_terminal("stopped"));
        assert!(job_states::is_terminal("CANCELLED"));
        assert!(!job_states::is_terminal("running"));
        assert!(!job_states::is_terminal(""));
    }

    #[test]
    fn test_status_groups_are_disjoint() {
        for state in status_groups::IN_PROGRESS_STATES {
            assert!(!status_groups::FINISHED_STATES.contains(state));
        }
    }
}
