mod common;

use chrono::Utc;
use common::strategies::*;
use proptest::prelude::*;
use serde_json::Map;
use std::sync::Arc;

use promote_core::config::PromoteConfig;
use promote_core::storage::InMemoryBlobStore;
use promote_core::{instance_key_for, BatchManager, RunState, RunStatus, StatusUpdate, WorkItem};

/// Add every path through a fresh manager and return the finalized batches' contents
fn build_batches(paths: &[String], capacity: usize) -> Vec<(u32, Vec<WorkItem>)> {
    tokio_test::block_on(async {
        let mut config = PromoteConfig::new("promote", "worker", "/state");
        config.batch_capacity = capacity;
        let mut manager = BatchManager::new(Arc::new(config), Arc::new(InMemoryBlobStore::new()));
        manager.resume_or_create("site").await.unwrap();
        for path in paths {
            manager
                .add_work_item(WorkItem::new("ref", path.clone()))
                .await
                .unwrap();
        }
        let instance = manager.finalize_instance(Map::new()).await.unwrap();

        let mut batches = Vec::new();
        for entry in &instance.batches {
            let batch = manager.open_batch("site", entry.number).await.unwrap();
            batches.push((entry.number, batch.items().await.unwrap()));
        }
        batches
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: no batch exceeds capacity and numbers run 1..=n without gaps
    #[test]
    fn batches_respect_capacity_and_numbering(
        paths in path_list_strategy(20),
        capacity in capacity_strategy(),
    ) {
        let batches = build_batches(&paths, capacity);

        let expected_count = paths.len().div_ceil(capacity);
        prop_assert_eq!(batches.len(), expected_count);
        for (index, (number, items)) in batches.iter().enumerate() {
            prop_assert_eq!(*number as usize, index + 1);
            prop_assert!(items.len() <= capacity);
            prop_assert!(!items.is_empty());
        }

        // Insertion order survives sharding
        let flattened: Vec<String> = batches
            .into_iter()
            .flat_map(|(_, items)| items.into_iter().map(|item| item.path))
            .collect();
        prop_assert_eq!(flattened, paths);
    }

    /// Property: in-progress and finished never overlap; NOT_STARTED is neither
    #[test]
    fn status_predicates_partition_states(state in run_state_strategy()) {
        let in_progress = state.is_in_progress();
        let finished = state.is_finished();
        prop_assert!(!(in_progress && finished));
        prop_assert_eq!(state == RunState::NotStarted, !in_progress && !finished);
    }

    /// Property: reaching a finished state always leaves a valid interval
    #[test]
    fn finished_status_has_start_and_end(
        history in prop::collection::vec(run_state_strategy(), 0..6),
        last in prop::sample::select(vec![
            RunState::Completed,
            RunState::CompletedWithError,
            RunState::Failed,
        ]),
    ) {
        let mut status = RunStatus::not_started();
        for state in history {
            status = status.apply(StatusUpdate::status(state), Utc::now());
        }
        status = status.apply(StatusUpdate::status(last).with_message("m"), Utc::now());

        let start = status.start_time;
        let end = status.end_time;
        prop_assert!(start.is_some());
        prop_assert!(end.is_some());
        prop_assert!(start <= end);
    }

    /// Property: derived instance keys are lowercase snake identifiers
    #[test]
    fn instance_keys_are_sanitized(root in root_path_strategy()) {
        match instance_key_for(&root) {
            Ok(key) => {
                prop_assert!(key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
                prop_assert!(!key.starts_with('_') && !key.ends_with('_'));
                prop_assert!(!key.contains("__"));
            }
            Err(_) => prop_assert!(!root.chars().any(|c| c.is_ascii_alphanumeric())),
        }
    }
}
