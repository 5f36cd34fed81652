//! Background worker driving reconciliation runs.
//!
//! Jobs are executed on spawned tasks behind a semaphore that bounds
//! concurrency. Shutdown is cooperative: a flag stops new steps from
//! being picked up and closing the semaphore rejects queued jobs, while
//! in-flight steps finish their current checkpoint-to-checkpoint span.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crosscheck_core::RunId;

use crate::executor::{ExecutionOutcome, ReconJob, ReconciliationExecutor};
use crate::lifecycle::{LifecycleManager, StepRunStatus};

/// Worker tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of runs executing at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Handle to a submitted job.
pub struct JobHandle {
    /// The run being driven.
    pub run_id: RunId,
    handle: JoinHandle<()>,
}

impl JobHandle {
    /// Wait for the driving task to finish.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            error!(run_id = %self.run_id, error = %err, "Job task panicked");
        }
    }
}

/// Executes reconciliation jobs under lifecycle supervision.
pub struct ReconWorker {
    lifecycle: Arc<LifecycleManager>,
    executor: Arc<ReconciliationExecutor>,
    semaphore: Arc<Semaphore>,
    shutdown: Arc<AtomicBool>,
}

impl ReconWorker {
    /// Create a worker.
    #[must_use]
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        executor: Arc<ReconciliationExecutor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            lifecycle,
            executor,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Submit a run with one job payload per step of its stream, in step
    /// order. Each step run executes exactly one job; a step without a
    /// payload fails the run. The returned handle can be awaited for
    /// completion; dropping it detaches the task.
    pub fn submit(&self, run_id: RunId, jobs: Vec<ReconJob>) -> JobHandle {
        let lifecycle = Arc::clone(&self.lifecycle);
        let executor = Arc::clone(&self.executor);
        let semaphore = Arc::clone(&self.semaphore);
        let shutdown = Arc::clone(&self.shutdown);

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(run_id = %run_id, "Worker shut down before job started");
                    return;
                }
            };
            if shutdown.load(Ordering::Relaxed) {
                warn!(run_id = %run_id, "Worker shutting down, job dropped");
                return;
            }

            if let Err(err) = lifecycle.start_run(run_id).await {
                error!(run_id = %run_id, error = %err, "Failed to start run");
                return;
            }
            drive_run(&lifecycle, &executor, &shutdown, run_id, &jobs).await;
        });

        JobHandle { run_id, handle }
    }

    /// Stop picking up new work. Queued jobs are rejected; steps already
    /// executing finish.
    pub fn shutdown(&self) {
        info!("Worker shutting down");
        self.shutdown.store(true, Ordering::Relaxed);
        self.semaphore.close();
    }
}

/// Step through a running run: execute each dispatched step run against
/// its own job payload and feed the result back into the lifecycle until
/// no IN_PROGRESS step remains. Payloads pair with step runs positionally
/// in step order, so each reconciliation executes exactly once.
async fn drive_run(
    lifecycle: &LifecycleManager,
    executor: &ReconciliationExecutor,
    shutdown: &AtomicBool,
    run_id: RunId,
    jobs: &[ReconJob],
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            warn!(run_id = %run_id, "Shutdown requested, leaving run in place");
            return;
        }

        let step_runs = match lifecycle.step_runs(run_id).await {
            Ok(step_runs) => step_runs,
            Err(err) => {
                error!(run_id = %run_id, error = %err, "Failed to poll step runs");
                return;
            }
        };
        let Some((position, step_run)) = step_runs
            .iter()
            .enumerate()
            .find(|(_, s)| s.status == StepRunStatus::InProgress)
        else {
            return;
        };

        let result = match jobs.get(position) {
            None => {
                lifecycle
                    .fail_step_run(step_run.id, "No job payload for this step")
                    .await
            }
            Some(job) => {
                let mut job = job.clone();
                job.run_id = run_id;
                match executor.execute(&job).await {
                    Ok(ExecutionOutcome::Completed(_)) => {
                        lifecycle.complete_step_run(step_run.id).await
                    }
                    Ok(ExecutionOutcome::Canceled) => {
                        info!(run_id = %run_id, "Run canceled mid-execution");
                        return;
                    }
                    Err(err) => lifecycle.fail_step_run(step_run.id, &err.to_string()).await,
                }
            }
        };

        match result {
            Ok(run) if run.status.is_terminal() => return,
            Ok(_) => {}
            Err(err) => {
                error!(run_id = %run_id, error = %err, "Lifecycle transition failed");
                return;
            }
        }
    }
}
