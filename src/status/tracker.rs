use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{RunStatus, StatusStore, StatusUpdate};
use crate::error::Result;

/// Deterministic digest of a logical status key
pub fn status_hash(logical_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(logical_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Logical key of a run's status record
pub fn run_status_key(orchestration_key: &str, instance_key: &str) -> String {
    format!("{orchestration_key}/{instance_key}")
}

/// Logical key of one batch's status record
pub fn batch_status_key(orchestration_key: &str, instance_key: &str, batch_number: u32) -> String {
    format!("{orchestration_key}/{instance_key}/batch_{batch_number}")
}

/// Read-modify-write access to status records.
///
/// Updates are not atomic: a concurrent writer to the same key can be
/// overwritten. Every update returns the record as written.
#[derive(Debug, Clone)]
pub struct RunStatusTracker {
    store: Arc<dyn StatusStore>,
    ttl: Duration,
}

impl RunStatusTracker {
    pub fn new(store: Arc<dyn StatusStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Current record, or the blank template when none exists
    pub async fn get(&self, logical_key: &str) -> Result<RunStatus> {
        let hash = status_hash(logical_key);
        match self.store.get(&hash).await? {
            Some(stored) => Ok(serde_json::from_value(stored.value)?),
            None => Ok(RunStatus::not_started()),
        }
    }

    /// Apply `update` to the stored record and write it back whole
    #[instrument(skip(self, update), fields(status = ?update.status))]
    pub async fn update(&self, logical_key: &str, update: StatusUpdate) -> Result<RunStatus> {
        let current = self.get(logical_key).await?;
        self.write(logical_key, current.apply(update, Utc::now()))
            .await
    }

    /// Discard any stored record and apply `update` to the blank template
    pub async fn reset(&self, logical_key: &str, update: StatusUpdate) -> Result<RunStatus> {
        self.write(logical_key, RunStatus::not_started().apply(update, Utc::now()))
            .await
    }

    pub async fn delete(&self, logical_key: &str) -> Result<()> {
        self.store.delete(&status_hash(logical_key)).await
    }

    async fn write(&self, logical_key: &str, record: RunStatus) -> Result<RunStatus> {
        let value = serde_json::to_value(&record)?;
        self.store
            .put(&status_hash(logical_key), value, self.ttl)
            .await?;
        debug!(
            key = %logical_key,
            status = %record.status,
            "Run status written"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{InMemoryStatusStore, RunState};

    fn tracker() -> RunStatusTracker {
        RunStatusTracker::new(
            Arc::new(InMemoryStatusStore::new()),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_hash_is_deterministic_and_distinct() {
        let a = status_hash("promote/site");
        assert_eq!(a, status_hash("promote/site"));
        assert_ne!(a, status_hash("promote/site/batch_1"));
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_missing_record_reads_as_not_started() {
        let status = tracker().get("promote/unknown").await.unwrap();
        assert_eq!(status.status, RunState::NotStarted);
        assert!(status.start_time.is_none());
    }

    #[tokio::test]
    async fn test_completed_round_trip_has_both_timestamps() {
        let tracker = tracker();
        tracker
            .update(
                "promote/site",
                StatusUpdate::status(RunState::Completed).with_message("m"),
            )
            .await
            .unwrap();

        let read = tracker.get("promote/site").await.unwrap();
        assert_eq!(read.status, RunState::Completed);
        assert_eq!(read.message.as_deref(), Some("m"));
        assert!(read.end_time.is_some());
        assert!(read.start_time.is_some());
    }

    #[tokio::test]
    async fn test_run_and_batch_records_are_independent() {
        let tracker = tracker();
        tracker
            .update(
                &run_status_key("promote", "site"),
                StatusUpdate::status(RunState::InProgress),
            )
            .await
            .unwrap();
        tracker
            .update(
                &batch_status_key("promote", "site", 1),
                StatusUpdate::status(RunState::Failed),
            )
            .await
            .unwrap();

        let run = tracker.get(&run_status_key("promote", "site")).await.unwrap();
        assert_eq!(run.status, RunState::InProgress);
        assert!(run.end_time.is_none());
    }

    #[tokio::test]
    async fn test_reset_discards_previous_timestamps() {
        let tracker = tracker();
        let first = tracker
            .update("k", StatusUpdate::status(RunState::Completed))
            .await
            .unwrap();
        assert!(first.end_time.is_some());

        let fresh = tracker
            .reset("k", StatusUpdate::status(RunState::Started))
            .await
            .unwrap();
        assert_eq!(fresh.status, RunState::Started);
        assert!(fresh.end_time.is_none());
        assert!(fresh.start_time.is_some());
    }
}
