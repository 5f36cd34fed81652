//! Run Lifecycle Tests
//!
//! Coverage for the `LifecycleManager` state machine:
//! - Run creation, start, and step-run dispatch ordering
//! - Completion advance and terminal-state resolution
//! - Stop-on-failure propagation (remaining steps SKIPPED)
//! - Retry with attempt counting
//! - Cancellation cascade over non-terminal step runs
//! - Transition guards rejecting out-of-order calls

use std::sync::Arc;

use crosscheck_core::OrgId;
use crosscheck_engine::{
    InMemoryStore, LifecycleError, LifecycleManager, Run, RunStatus, RunStore, StepDefinition,
    StepRunStatus, Stream,
};

fn manager() -> (Arc<InMemoryStore>, LifecycleManager) {
    let store = InMemoryStore::shared();
    let manager = LifecycleManager::new(store.clone());
    (store, manager)
}

async fn supervised_run(
    manager: &LifecycleManager,
    step_names: &[&str],
) -> (OrgId, Run) {
    let org_id = OrgId::new();
    let steps = step_names
        .iter()
        .enumerate()
        .map(|(i, name)| StepDefinition::new(*name, i as i32 + 1))
        .collect();
    let stream = Stream::new(org_id, "nightly", steps);
    let stream_id = stream.id;
    manager.register_stream(stream).await.unwrap();
    let run = manager.create_run(stream_id, org_id).await.unwrap();
    (org_id, run)
}

#[tokio::test]
async fn run_walks_through_all_steps_to_completed() {
    let (_, manager) = manager();
    let (_, run) = supervised_run(&manager, &["parse", "diff"]).await;
    assert_eq!(run.status, RunStatus::Pending);

    let run = manager.start_run(run.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.current_step_order, Some(1));

    let first = manager
        .in_progress_step_run(run.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.step_order, 1);

    let run = manager.complete_step_run(first.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.current_step_order, Some(2));

    let second = manager
        .in_progress_step_run(run.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.step_order, 2);

    let run = manager.complete_step_run(second.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.current_step_order, None);
    assert!(run.completed_at.is_some());

    let step_runs = manager.step_runs(run.id).await.unwrap();
    assert!(step_runs
        .iter()
        .all(|s| s.status == StepRunStatus::Completed && s.progress == 100));
}

#[tokio::test]
async fn create_run_rejects_foreign_org() {
    let (_, manager) = manager();
    let org_id = OrgId::new();
    let stream = Stream::new(org_id, "nightly", vec![StepDefinition::new("diff", 1)]);
    let stream_id = stream.id;
    manager.register_stream(stream).await.unwrap();

    let err = manager
        .create_run(stream_id, OrgId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Core(_)));
}

#[tokio::test]
async fn start_rejects_stream_without_steps() {
    let (_, manager) = manager();
    let (_, run) = supervised_run(&manager, &[]).await;

    let err = manager.start_run(run.id).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NoSteps { .. }));
}

#[tokio::test]
async fn start_is_guarded_against_double_dispatch() {
    let (_, manager) = manager();
    let (_, run) = supervised_run(&manager, &["diff"]).await;

    manager.start_run(run.id).await.unwrap();
    let err = manager.start_run(run.id).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidStateTransition { .. }
    ));
}

#[tokio::test]
async fn failure_skips_remaining_steps_and_fails_the_run() {
    let (_, manager) = manager();
    let (_, run) = supervised_run(&manager, &["parse", "diff", "report"]).await;
    manager.start_run(run.id).await.unwrap();

    let first = manager
        .in_progress_step_run(run.id)
        .await
        .unwrap()
        .unwrap();
    let run = manager
        .fail_step_run(first.id, "source unreachable")
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("source unreachable"));

    let step_runs = manager.step_runs(run.id).await.unwrap();
    assert_eq!(step_runs[0].status, StepRunStatus::Failed);
    assert_eq!(step_runs[1].status, StepRunStatus::Skipped);
    assert_eq!(step_runs[2].status, StepRunStatus::Skipped);
}

#[tokio::test]
async fn retry_increments_the_attempt_counter() {
    let (_, manager) = manager();
    let (_, run) = supervised_run(&manager, &["diff"]).await;
    manager.start_run(run.id).await.unwrap();

    let step_run = manager
        .in_progress_step_run(run.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(step_run.attempt_no, 1);

    let parked = manager
        .mark_step_run_retry_wait(step_run.id)
        .await
        .unwrap();
    assert_eq!(parked.status, StepRunStatus::RetryWait);

    let retried = manager.retry_step_run(step_run.id).await.unwrap();
    assert_eq!(retried.status, StepRunStatus::InProgress);
    assert_eq!(retried.attempt_no, 2);

    // A completed step run can no longer be parked.
    let run = manager.complete_step_run(step_run.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    let err = manager
        .mark_step_run_retry_wait(step_run.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidStateTransition { .. }
    ));
}

#[tokio::test]
async fn cancel_cascades_only_to_non_terminal_step_runs() {
    let (_, manager) = manager();
    let (_, run) = supervised_run(&manager, &["parse", "diff", "report"]).await;
    manager.start_run(run.id).await.unwrap();

    let first = manager
        .in_progress_step_run(run.id)
        .await
        .unwrap()
        .unwrap();
    manager.complete_step_run(first.id).await.unwrap();

    let run = manager.cancel_run(run.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Canceled);

    let step_runs = manager.step_runs(run.id).await.unwrap();
    assert_eq!(step_runs[0].status, StepRunStatus::Completed);
    assert_eq!(step_runs[1].status, StepRunStatus::Canceled);
    assert_eq!(step_runs[2].status, StepRunStatus::Canceled);
}

#[tokio::test]
async fn cancel_is_rejected_after_completion() {
    let (_, manager) = manager();
    let (_, run) = supervised_run(&manager, &["diff"]).await;
    manager.start_run(run.id).await.unwrap();

    let step_run = manager
        .in_progress_step_run(run.id)
        .await
        .unwrap()
        .unwrap();
    manager.complete_step_run(step_run.id).await.unwrap();

    let err = manager.cancel_run(run.id).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidStateTransition { .. }
    ));
}

#[tokio::test]
async fn advance_resolves_partial_failed_when_mixed_outcomes_remain() {
    let (store, manager) = manager();
    let (_, run) = supervised_run(&manager, &["parse", "diff"]).await;
    manager.start_run(run.id).await.unwrap();

    // Simulate an out-of-band failure of the second step while the first is
    // still executing, then complete the first: the advance pass finds no
    // pending work and must resolve the mixed outcome.
    let step_runs = manager.step_runs(run.id).await.unwrap();
    let mut second = step_runs[1].clone();
    second.status = StepRunStatus::Failed;
    store.update_step_run(&second).await.unwrap();

    let run = manager.complete_step_run(step_runs[0].id).await.unwrap();
    assert_eq!(run.status, RunStatus::PartialFailed);

    // PARTIAL_FAILED remains cancelable.
    let run = manager.cancel_run(run.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Canceled);
}
