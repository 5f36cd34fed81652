//! Run lifecycle state machine.
//!
//! Supervises execution of a reconciliation run end-to-end: step-run
//! creation, dispatch ordering, completion and failure propagation,
//! retry, cancellation cascade, and terminal-state resolution. Every
//! transition is guarded by a precondition check on current state before
//! any mutation, so a second caller attempting the same transition
//! observes the changed state and fails the guard instead of
//! double-applying the effect. Guard violations surface as typed
//! [`LifecycleError::InvalidStateTransition`] errors; they indicate an
//! ordering bug in the caller and are never swallowed.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crosscheck_core::{CoreError, OrgId, OrgScoped, RunId, StepId, StepRunId, StreamId};

use crate::store::{RunStore, StoreError};

/// Status of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
    PartialFailed,
}

impl RunStatus {
    /// Whether this status is terminal. Terminal runs are immutable except
    /// for the PARTIAL_FAILED → CANCELED edge.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Canceled | RunStatus::PartialFailed
        )
    }

    /// Whether a cancel request is accepted from this status.
    #[must_use]
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            RunStatus::Pending | RunStatus::Running | RunStatus::PartialFailed
        )
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Canceled => "CANCELED",
            RunStatus::PartialFailed => "PARTIAL_FAILED",
        };
        write!(f, "{s}")
    }
}

/// Status of a single step execution within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepRunStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    RetryWait,
    Skipped,
    Canceled,
}

impl StepRunStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepRunStatus::Completed
                | StepRunStatus::Failed
                | StepRunStatus::Skipped
                | StepRunStatus::Canceled
        )
    }

    /// Whether a run-level cancel cascades to this step run.
    #[must_use]
    pub fn cancelable(&self) -> bool {
        matches!(
            self,
            StepRunStatus::Pending | StepRunStatus::InProgress | StepRunStatus::RetryWait
        )
    }
}

impl Display for StepRunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepRunStatus::Pending => "PENDING",
            StepRunStatus::InProgress => "IN_PROGRESS",
            StepRunStatus::Completed => "COMPLETED",
            StepRunStatus::Failed => "FAILED",
            StepRunStatus::RetryWait => "RETRY_WAIT",
            StepRunStatus::Skipped => "SKIPPED",
            StepRunStatus::Canceled => "CANCELED",
        };
        write!(f, "{s}")
    }
}

/// One ordered step within a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step ID.
    pub id: StepId,
    /// Human-readable name.
    pub name: String,
    /// Dispatch order; lower runs first.
    pub order: i32,
}

impl StepDefinition {
    /// Create a step definition.
    #[must_use]
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            id: StepId::new(),
            name: name.into(),
            order,
        }
    }
}

/// An ordered pipeline of reconciliation steps owned by one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    /// Stream ID.
    pub id: StreamId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Human-readable name.
    pub name: String,
    /// Ordered steps.
    pub steps: Vec<StepDefinition>,
}

impl Stream {
    /// Create a stream.
    #[must_use]
    pub fn new(org_id: OrgId, name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            id: StreamId::new(),
            org_id,
            name: name.into(),
            steps,
        }
    }
}

impl OrgScoped for Stream {
    fn org_id(&self) -> OrgId {
        self.org_id
    }
}

/// One execution attempt of a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run ID.
    pub id: RunId,
    /// The stream being executed.
    pub stream_id: StreamId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Run status.
    pub status: RunStatus,
    /// Order of the step currently executing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_order: Option<i32>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When execution started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Create a pending run.
    #[must_use]
    pub fn new(stream_id: StreamId, org_id: OrgId) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            stream_id,
            org_id,
            status: RunStatus::Pending,
            current_step_order: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl OrgScoped for Run {
    fn org_id(&self) -> OrgId {
        self.org_id
    }
}

/// Execution record of a single ordered step within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRun {
    /// Step run ID.
    pub id: StepRunId,
    /// Owning run.
    pub run_id: RunId,
    /// The step definition being executed.
    pub step_id: StepId,
    /// Dispatch order, copied from the step definition.
    pub step_order: i32,
    /// Step run status.
    pub status: StepRunStatus,
    /// Attempt counter; starts at 1, incremented on retry.
    pub attempt_no: u32,
    /// Progress percentage, 0-100.
    pub progress: u8,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When this step run was dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When this step run reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRun {
    /// Create a pending step run for a step definition.
    #[must_use]
    pub fn new(run_id: RunId, step: &StepDefinition) -> Self {
        Self {
            id: StepRunId::new(),
            run_id,
            step_id: step.id,
            step_order: step.order,
            status: StepRunStatus::Pending,
            attempt_no: 1,
            progress: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Errors from lifecycle transitions.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A transition precondition failed.
    #[error("Invalid state transition for {entity}: {from} -> {to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// A run cannot start on a stream without steps.
    #[error("Stream {stream_id} has no steps defined")]
    NoSteps { stream_id: StreamId },

    /// Unknown entity or cross-organization access.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

fn transition_error(
    entity: &str,
    from: impl Display,
    to: impl Display,
) -> LifecycleError {
    LifecycleError::InvalidStateTransition {
        entity: entity.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Manages Run and StepRun state over a [`RunStore`].
pub struct LifecycleManager {
    store: Arc<dyn RunStore>,
}

impl LifecycleManager {
    /// Create a manager over a store.
    #[must_use]
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Register a stream definition.
    pub async fn register_stream(&self, stream: Stream) -> LifecycleResult<()> {
        self.store.insert_stream(stream).await?;
        Ok(())
    }

    /// Create a run in PENDING for a stream, enforcing org ownership.
    pub async fn create_run(&self, stream_id: StreamId, org_id: OrgId) -> LifecycleResult<Run> {
        let stream = self
            .store
            .get_stream(stream_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: "Stream".to_string(),
                id: Some(stream_id.to_string()),
            })?;

        if stream.org_id() != org_id {
            return Err(CoreError::AccessDenied {
                owner: stream.org_id(),
                caller: org_id,
            }
            .into());
        }

        let run = Run::new(stream_id, org_id);
        self.store.insert_run(run.clone()).await?;

        info!(run_id = %run.id, stream_id = %stream_id, "Created run");
        Ok(run)
    }

    /// Start a PENDING run: create one step run per step and dispatch the
    /// first.
    pub async fn start_run(&self, run_id: RunId) -> LifecycleResult<Run> {
        let mut run = self.fetch_run(run_id).await?;
        if run.status != RunStatus::Pending {
            return Err(transition_error("Run", run.status, RunStatus::Running));
        }

        let stream = self
            .store
            .get_stream(run.stream_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: "Stream".to_string(),
                id: Some(run.stream_id.to_string()),
            })?;
        if stream.steps.is_empty() {
            return Err(LifecycleError::NoSteps {
                stream_id: stream.id,
            });
        }

        let mut steps = stream.steps.clone();
        steps.sort_by_key(|s| s.order);

        let mut step_runs = Vec::with_capacity(steps.len());
        for step in &steps {
            let step_run = StepRun::new(run_id, step);
            self.store.insert_step_run(step_run.clone()).await?;
            step_runs.push(step_run);
        }

        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        run.current_step_order = Some(steps[0].order);
        run.updated_at = Utc::now();
        self.store.update_run(&run).await?;

        self.dispatch_step_run(step_runs[0].id).await?;

        info!(
            run_id = %run_id,
            steps = steps.len(),
            "Started run"
        );
        Ok(run)
    }

    /// Dispatch a PENDING step run.
    pub async fn dispatch_step_run(&self, step_run_id: StepRunId) -> LifecycleResult<StepRun> {
        let mut step_run = self.fetch_step_run(step_run_id).await?;
        if step_run.status != StepRunStatus::Pending {
            return Err(transition_error(
                "StepRun",
                step_run.status,
                StepRunStatus::InProgress,
            ));
        }

        step_run.status = StepRunStatus::InProgress;
        step_run.started_at = Some(Utc::now());
        self.store.update_step_run(&step_run).await?;
        Ok(step_run)
    }

    /// Complete an IN_PROGRESS step run, then advance the run: dispatch the
    /// lowest-order remaining PENDING step run, or resolve the run's
    /// terminal state when none remain.
    pub async fn complete_step_run(&self, step_run_id: StepRunId) -> LifecycleResult<Run> {
        let mut step_run = self.fetch_step_run(step_run_id).await?;
        if step_run.status != StepRunStatus::InProgress {
            return Err(transition_error(
                "StepRun",
                step_run.status,
                StepRunStatus::Completed,
            ));
        }

        step_run.status = StepRunStatus::Completed;
        step_run.progress = 100;
        step_run.completed_at = Some(Utc::now());
        self.store.update_step_run(&step_run).await?;

        self.advance(step_run.run_id).await
    }

    /// Fail an IN_PROGRESS step run. Stop-on-failure policy: all remaining
    /// PENDING step runs are SKIPPED and the run becomes FAILED.
    pub async fn fail_step_run(
        &self,
        step_run_id: StepRunId,
        error: &str,
    ) -> LifecycleResult<Run> {
        let mut step_run = self.fetch_step_run(step_run_id).await?;
        if step_run.status != StepRunStatus::InProgress {
            return Err(transition_error(
                "StepRun",
                step_run.status,
                StepRunStatus::Failed,
            ));
        }

        step_run.status = StepRunStatus::Failed;
        step_run.error_message = Some(error.to_string());
        step_run.completed_at = Some(Utc::now());
        self.store.update_step_run(&step_run).await?;

        for mut remaining in self.store.list_step_runs(step_run.run_id).await? {
            if remaining.status == StepRunStatus::Pending {
                remaining.status = StepRunStatus::Skipped;
                remaining.completed_at = Some(Utc::now());
                self.store.update_step_run(&remaining).await?;
            }
        }

        let mut run = self.fetch_run(step_run.run_id).await?;
        if !run.status.is_terminal() {
            run.status = RunStatus::Failed;
            run.error_message = Some(error.to_string());
            run.completed_at = Some(Utc::now());
            run.updated_at = Utc::now();
            self.store.update_run(&run).await?;
        }

        info!(
            run_id = %run.id,
            step_run_id = %step_run_id,
            error = %error,
            "Step run failed, run failed"
        );
        Ok(run)
    }

    /// Park an IN_PROGRESS step run for retry.
    pub async fn mark_step_run_retry_wait(
        &self,
        step_run_id: StepRunId,
    ) -> LifecycleResult<StepRun> {
        let mut step_run = self.fetch_step_run(step_run_id).await?;
        if step_run.status != StepRunStatus::InProgress {
            return Err(transition_error(
                "StepRun",
                step_run.status,
                StepRunStatus::RetryWait,
            ));
        }

        step_run.status = StepRunStatus::RetryWait;
        self.store.update_step_run(&step_run).await?;
        Ok(step_run)
    }

    /// Re-dispatch a RETRY_WAIT step run, incrementing the attempt counter.
    /// Retries are immediate; backoff timing is future work.
    pub async fn retry_step_run(&self, step_run_id: StepRunId) -> LifecycleResult<StepRun> {
        let mut step_run = self.fetch_step_run(step_run_id).await?;
        if step_run.status != StepRunStatus::RetryWait {
            return Err(transition_error(
                "StepRun",
                step_run.status,
                StepRunStatus::InProgress,
            ));
        }

        step_run.status = StepRunStatus::InProgress;
        step_run.attempt_no += 1;
        step_run.started_at = Some(Utc::now());
        self.store.update_step_run(&step_run).await?;

        info!(
            step_run_id = %step_run_id,
            attempt_no = step_run.attempt_no,
            "Retrying step run"
        );
        Ok(step_run)
    }

    /// Cancel a run. Cascades CANCELED to every step run still in
    /// PENDING, IN_PROGRESS, or RETRY_WAIT; COMPLETED and FAILED step runs
    /// are untouched.
    pub async fn cancel_run(&self, run_id: RunId) -> LifecycleResult<Run> {
        let mut run = self.fetch_run(run_id).await?;
        if !run.status.can_cancel() {
            return Err(transition_error("Run", run.status, RunStatus::Canceled));
        }

        for mut step_run in self.store.list_step_runs(run_id).await? {
            if step_run.status.cancelable() {
                step_run.status = StepRunStatus::Canceled;
                step_run.completed_at = Some(Utc::now());
                self.store.update_step_run(&step_run).await?;
            }
        }

        run.status = RunStatus::Canceled;
        run.completed_at = Some(Utc::now());
        run.updated_at = Utc::now();
        self.store.update_run(&run).await?;

        info!(run_id = %run_id, "Canceled run");
        Ok(run)
    }

    /// Fetch a run, or a typed NotFound.
    pub async fn get_run(&self, run_id: RunId) -> LifecycleResult<Run> {
        self.fetch_run(run_id).await
    }

    /// The currently IN_PROGRESS step run for a run, if any.
    pub async fn in_progress_step_run(&self, run_id: RunId) -> LifecycleResult<Option<StepRun>> {
        let step_runs = self.store.list_step_runs(run_id).await?;
        Ok(step_runs
            .into_iter()
            .find(|s| s.status == StepRunStatus::InProgress))
    }

    /// All step runs for a run, ordered by step order.
    pub async fn step_runs(&self, run_id: RunId) -> LifecycleResult<Vec<StepRun>> {
        Ok(self.store.list_step_runs(run_id).await?)
    }

    /// Advance after a completion: dispatch the next PENDING step run or
    /// resolve the run's terminal state.
    async fn advance(&self, run_id: RunId) -> LifecycleResult<Run> {
        let mut run = self.fetch_run(run_id).await?;
        let step_runs = self.store.list_step_runs(run_id).await?;

        let next_pending = step_runs
            .iter()
            .filter(|s| s.status == StepRunStatus::Pending)
            .min_by_key(|s| s.step_order);

        if let Some(next) = next_pending {
            let dispatched = self.dispatch_step_run(next.id).await?;
            run.current_step_order = Some(dispatched.step_order);
            run.updated_at = Utc::now();
            self.store.update_run(&run).await?;
            return Ok(run);
        }

        // No pending work remains: resolve the terminal state.
        let any_failed = step_runs.iter().any(|s| s.status == StepRunStatus::Failed);
        let any_completed = step_runs
            .iter()
            .any(|s| s.status == StepRunStatus::Completed);

        run.status = match (any_failed, any_completed) {
            (true, true) => RunStatus::PartialFailed,
            (true, false) => RunStatus::Failed,
            _ => RunStatus::Completed,
        };
        run.current_step_order = None;
        run.completed_at = Some(Utc::now());
        run.updated_at = Utc::now();
        self.store.update_run(&run).await?;

        info!(run_id = %run_id, status = %run.status, "Run resolved");
        Ok(run)
    }

    async fn fetch_run(&self, run_id: RunId) -> LifecycleResult<Run> {
        self.store
            .get_run(run_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    resource: "Run".to_string(),
                    id: Some(run_id.to_string()),
                }
                .into()
            })
    }

    async fn fetch_step_run(&self, step_run_id: StepRunId) -> LifecycleResult<StepRun> {
        self.store
            .get_step_run(step_run_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    resource: "StepRun".to_string(),
                    id: Some(step_run_id.to_string()),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_terminal() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Canceled.is_terminal());
        assert!(RunStatus::PartialFailed.is_terminal());
    }

    #[test]
    fn test_run_status_can_cancel() {
        assert!(RunStatus::Pending.can_cancel());
        assert!(RunStatus::Running.can_cancel());
        assert!(RunStatus::PartialFailed.can_cancel());
        assert!(!RunStatus::Completed.can_cancel());
        assert!(!RunStatus::Failed.can_cancel());
        assert!(!RunStatus::Canceled.can_cancel());
    }

    #[test]
    fn test_step_run_status_cancelable() {
        assert!(StepRunStatus::Pending.cancelable());
        assert!(StepRunStatus::InProgress.cancelable());
        assert!(StepRunStatus::RetryWait.cancelable());
        assert!(!StepRunStatus::Completed.cancelable());
        assert!(!StepRunStatus::Failed.cancelable());
        assert!(!StepRunStatus::Skipped.cancelable());
    }

    #[test]
    fn test_status_display_wire_names() {
        assert_eq!(RunStatus::PartialFailed.to_string(), "PARTIAL_FAILED");
        assert_eq!(StepRunStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(StepRunStatus::RetryWait.to_string(), "RETRY_WAIT");
    }

    #[test]
    fn test_new_step_run_starts_at_attempt_one() {
        let step = StepDefinition::new("diff", 1);
        let step_run = StepRun::new(RunId::new(), &step);
        assert_eq!(step_run.attempt_no, 1);
        assert_eq!(step_run.progress, 0);
        assert_eq!(step_run.status, StepRunStatus::Pending);
    }
}
