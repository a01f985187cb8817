mod common;

use common::*;
use promote_core::status::ActivationLiveness;
use promote_core::{BatchManager, PromoteError, RunState, TickOutcome};
use std::sync::Arc;

#[tokio::test]
async fn test_begin_marks_run_started() {
    let h = Harness::new(2);
    let run = h
        .launcher()
        .begin("site", "editor@example.com", Some("builder-1"))
        .await
        .unwrap();

    assert_eq!(run.instance_key(), "site");
    let status = h.run_status("site").await;
    assert_eq!(status.status, RunState::Started);
    assert_eq!(status.activation_handle.as_deref(), Some("builder-1"));
    assert_eq!(status.last_triggered_by.as_deref(), Some("editor@example.com"));
    assert!(status.start_time.is_some());
    assert!(status.end_time.is_none());
    assert_eq!(run.status(), &status);
}

#[tokio::test]
async fn test_second_begin_refused_while_builder_is_live() {
    let h = Harness::new(2);
    let _run = h
        .launcher()
        .begin("site", "test", Some("builder-1"))
        .await
        .unwrap();

    let err = h
        .launcher()
        .begin("site", "test", Some("builder-2"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PromoteError::RunInProgress {
            instance_key: "site".to_string(),
            activation_handle: Some("builder-1".to_string()),
        }
    );
}

#[tokio::test]
async fn test_stale_builder_is_resumed_from_sealed_batches() {
    let h = Harness::new(2);
    let mut stale = h
        .launcher()
        .begin("site", "test", Some("builder-1"))
        .await
        .unwrap();
    stale.add_work_item(item("/a")).await.unwrap();
    stale.add_work_item(item("/b")).await.unwrap();
    stale.add_work_item(item("/old")).await.unwrap();
    drop(stale);

    h.host.set("builder-1", ActivationLiveness::Inactive);
    let mut fresh = h
        .launcher()
        .begin("site", "test", Some("builder-2"))
        .await
        .unwrap();
    assert_eq!(fresh.status().activation_handle.as_deref(), Some("builder-2"));

    // Batch 1 was sealed before the builder stopped; the buffered item was not
    fresh.add_work_item(item("/c")).await.unwrap();
    let status = fresh.finish(Default::default()).await.unwrap();
    assert_eq!(
        status.batches.iter().map(|b| b.number).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let manager = BatchManager::new(Arc::clone(&h.config), Arc::new(h.store.clone()));
    let paths = |items: Vec<promote_core::WorkItem>| {
        items.into_iter().map(|i| i.path).collect::<Vec<_>>()
    };
    let first = manager.open_batch("site", 1).await.unwrap();
    assert_eq!(paths(first.items().await.unwrap()), vec!["/a", "/b"]);
    let second = manager.open_batch("site", 2).await.unwrap();
    assert_eq!(paths(second.items().await.unwrap()), vec!["/c"]);
}

#[tokio::test]
async fn test_begin_refused_while_dispatching() {
    let h = Harness::new(2);
    let status = h.build_run("site", &["/a"]).await;
    assert_eq!(status.status, RunState::InProgress);
    assert_eq!(status.activation_handle, None);

    // Builder gone, dispatch still owns the run
    h.host.set_default(ActivationLiveness::Inactive);
    let err = h.launcher().begin("site", "test", None).await.unwrap_err();
    assert!(matches!(err, PromoteError::RunInProgress { .. }));
}

#[tokio::test]
async fn test_completed_run_can_be_restarted_from_scratch() {
    let h = Harness::new(2);
    h.build_run("site", &["/a", "/b", "/c"]).await;
    let dispatch = h.dispatch_loop();
    dispatch.tick().await.unwrap();
    dispatch.tick().await.unwrap();
    h.worker().execute("site", 1, Some("act-1")).await.unwrap();
    h.worker().execute("site", 2, Some("act-2")).await.unwrap();
    assert!(matches!(
        dispatch.tick().await.unwrap(),
        TickOutcome::Completed { .. }
    ));
    let first_end = h.run_status("site").await.end_time;
    assert!(first_end.is_some());

    let status = h.build_run("site", &["/x"]).await;
    assert_eq!(status.status, RunState::InProgress);
    assert_eq!(status.end_time, None);
    assert_eq!(status.batches.len(), 1);
    assert_eq!(h.batch_status("site", 2).await.status, RunState::NotStarted);

    assert!(matches!(
        dispatch.tick().await.unwrap(),
        TickOutcome::Dispatched { batch_number: 1, .. }
    ));
    h.worker().execute("site", 1, Some("act-3")).await.unwrap();
    assert!(matches!(
        dispatch.tick().await.unwrap(),
        TickOutcome::Completed { .. }
    ));
    assert_eq!(
        h.api.submissions().last().map(|(_, paths)| paths.clone()),
        Some(vec!["/x".to_string()])
    );
}

#[tokio::test]
async fn test_fail_records_terminal_status() {
    let h = Harness::new(2);
    let run = h.launcher().begin("site", "test", None).await.unwrap();
    let status = run.fail("listing the source tree failed").await.unwrap();

    assert_eq!(status.status, RunState::Failed);
    assert_eq!(
        status.message.as_deref(),
        Some("listing the source tree failed")
    );
    assert!(status.start_time.is_some());
    assert!(status.end_time.is_some());

    // A failed build never became eligible for dispatch
    assert_eq!(h.dispatch_loop().tick().await.unwrap(), TickOutcome::Idle);
    assert!(h.launcher().begin("site", "test", None).await.is_ok());
}
