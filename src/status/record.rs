use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RunState;
use crate::batch::BatchEntry;

/// Consumer-facing status record for a run or a single batch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStatus {
    pub status: RunState,
    pub message: Option<String>,
    pub activation_handle: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_triggered_by: Option<String>,
    pub details: Map<String, Value>,
    pub batches: Vec<BatchEntry>,
}

impl RunStatus {
    /// Blank template used when no record exists
    pub fn not_started() -> Self {
        Self::default()
    }

    /// Apply an update and return the resulting record.
    ///
    /// Fields present in the update overwrite stored fields; `status` moves
    /// freely. `start_time` is set once, on the first in-progress status.
    /// `end_time` is set once, on the first finished status, and backfills a
    /// missing `start_time`.
    pub fn apply(mut self, update: StatusUpdate, now: DateTime<Utc>) -> Self {
        if let Some(status) = update.status {
            self.status = status;
            if status.is_in_progress() && self.start_time.is_none() {
                self.start_time = Some(now);
            }
            if status.is_finished() && self.end_time.is_none() {
                self.end_time = Some(now);
                if self.start_time.is_none() {
                    self.start_time = Some(now);
                }
            }
        }
        if let Some(message) = update.message {
            self.message = Some(message);
        }
        if let Some(handle) = update.activation_handle {
            self.activation_handle = handle;
        }
        if let Some(triggered_by) = update.last_triggered_by {
            self.last_triggered_by = Some(triggered_by);
        }
        if let Some(details) = update.details {
            self.details = details;
        }
        if let Some(batches) = update.batches {
            self.batches = batches;
        }
        self
    }
}

/// Partial update; `None` leaves the stored field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub status: Option<RunState>,
    pub message: Option<String>,
    /// `Some(None)` clears the stored handle
    pub activation_handle: Option<Option<String>>,
    pub last_triggered_by: Option<String>,
    pub details: Option<Map<String, Value>>,
    pub batches: Option<Vec<BatchEntry>>,
}

impl StatusUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(status: RunState) -> Self {
        Self::new().with_status(status)
    }

    pub fn with_status(mut self, status: RunState) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_activation_handle(mut self, handle: Option<String>) -> Self {
        self.activation_handle = Some(handle);
        self
    }

    pub fn with_triggered_by(mut self, triggered_by: impl Into<String>) -> Self {
        self.last_triggered_by = Some(triggered_by.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_batches(mut self, batches: Vec<BatchEntry>) -> Self {
        self.batches = Some(batches);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_finishing_before_start_backfills_start_time() {
        let now = Utc::now();
        let status = RunStatus::not_started().apply(
            StatusUpdate::status(RunState::Failed).with_message("boom"),
            now,
        );

        assert_eq!(status.status, RunState::Failed);
        assert_eq!(status.end_time, Some(now));
        assert_eq!(status.start_time, Some(now));
        assert_eq!(status.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_start_time_is_never_overwritten() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        let status = RunStatus::not_started()
            .apply(StatusUpdate::status(RunState::Started), t0)
            .apply(StatusUpdate::status(RunState::Started), t1)
            .apply(StatusUpdate::status(RunState::InProgress), t1);

        assert_eq!(status.start_time, Some(t0));
        assert_eq!(status.end_time, None);
    }

    #[test]
    fn test_end_time_is_set_exactly_once() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(5);
        let t2 = t0 + Duration::seconds(9);
        let status = RunStatus::not_started()
            .apply(StatusUpdate::status(RunState::Started), t0)
            .apply(StatusUpdate::status(RunState::Completed), t1)
            .apply(StatusUpdate::status(RunState::Failed), t2);

        assert_eq!(status.start_time, Some(t0));
        assert_eq!(status.end_time, Some(t1));
        assert_eq!(status.status, RunState::Failed);
    }

    #[test]
    fn test_absent_fields_are_preserved_and_handle_can_be_cleared() {
        let now = Utc::now();
        let status = RunStatus::not_started()
            .apply(
                StatusUpdate::status(RunState::Started)
                    .with_activation_handle(Some("act-1".to_string()))
                    .with_triggered_by("alice"),
                now,
            )
            .apply(StatusUpdate::new().with_message("halfway"), now);

        assert_eq!(status.activation_handle.as_deref(), Some("act-1"));
        assert_eq!(status.last_triggered_by.as_deref(), Some("alice"));
        assert_eq!(status.status, RunState::Started);

        let cleared = status.apply(StatusUpdate::new().with_activation_handle(None), now);
        assert_eq!(cleared.activation_handle, None);
    }
}
