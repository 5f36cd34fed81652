//! Persistence seams for runs and exceptions.
//!
//! Storage is behind async traits so the engine stays agnostic of the
//! backing database. [`InMemoryStore`] implements both traits over
//! tokio-guarded maps and is what the test suites and embedded callers
//! use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crosscheck_core::{ExceptionId, RunId, StepRunId, StreamId};

use crate::exception::ReconException;
use crate::lifecycle::{Run, StepRun, Stream};

/// Storage failure.
#[derive(Debug, Error)]
#[error("Store error: {message}")]
pub struct StoreError {
    /// What went wrong.
    pub message: String,
}

impl StoreError {
    /// Create a store error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for streams, runs, and step runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a stream definition.
    async fn insert_stream(&self, stream: Stream) -> StoreResult<()>;

    /// Fetch a stream by ID.
    async fn get_stream(&self, stream_id: StreamId) -> StoreResult<Option<Stream>>;

    /// Persist a new run.
    async fn insert_run(&self, run: Run) -> StoreResult<()>;

    /// Fetch a run by ID.
    async fn get_run(&self, run_id: RunId) -> StoreResult<Option<Run>>;

    /// Persist run mutations.
    async fn update_run(&self, run: &Run) -> StoreResult<()>;

    /// Persist a new step run.
    async fn insert_step_run(&self, step_run: StepRun) -> StoreResult<()>;

    /// Fetch a step run by ID.
    async fn get_step_run(&self, step_run_id: StepRunId) -> StoreResult<Option<StepRun>>;

    /// All step runs for a run, ordered by step order ascending.
    async fn list_step_runs(&self, run_id: RunId) -> StoreResult<Vec<StepRun>>;

    /// Persist step run mutations.
    async fn update_step_run(&self, step_run: &StepRun) -> StoreResult<()>;
}

/// Storage for reconciliation exceptions.
#[async_trait]
pub trait ExceptionStore: Send + Sync {
    /// Persist a batch of exceptions.
    async fn insert_batch(&self, exceptions: Vec<ReconException>) -> StoreResult<()>;

    /// Attach an AI suggestion to a stored exception.
    async fn update_suggestion(
        &self,
        exception_id: ExceptionId,
        suggestion: &str,
    ) -> StoreResult<()>;

    /// All exceptions recorded for a run, in insertion order.
    async fn list_for_run(&self, run_id: RunId) -> StoreResult<Vec<ReconException>>;
}

#[derive(Default)]
struct InMemoryState {
    streams: HashMap<StreamId, Stream>,
    runs: HashMap<RunId, Run>,
    step_runs: HashMap<StepRunId, StepRun>,
    exceptions: Vec<ReconException>,
}

/// Tokio-guarded in-memory implementation of both stores.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<InMemoryState>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store wrapped in an [`Arc`].
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn insert_stream(&self, stream: Stream) -> StoreResult<()> {
        self.state.write().await.streams.insert(stream.id, stream);
        Ok(())
    }

    async fn get_stream(&self, stream_id: StreamId) -> StoreResult<Option<Stream>> {
        Ok(self.state.read().await.streams.get(&stream_id).cloned())
    }

    async fn insert_run(&self, run: Run) -> StoreResult<()> {
        self.state.write().await.runs.insert(run.id, run);
        Ok(())
    }

    async fn get_run(&self, run_id: RunId) -> StoreResult<Option<Run>> {
        Ok(self.state.read().await.runs.get(&run_id).cloned())
    }

    async fn update_run(&self, run: &Run) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.runs.contains_key(&run.id) {
            return Err(StoreError::new(format!("Unknown run {}", run.id)));
        }
        state.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn insert_step_run(&self, step_run: StepRun) -> StoreResult<()> {
        self.state
            .write()
            .await
            .step_runs
            .insert(step_run.id, step_run);
        Ok(())
    }

    async fn get_step_run(&self, step_run_id: StepRunId) -> StoreResult<Option<StepRun>> {
        Ok(self.state.read().await.step_runs.get(&step_run_id).cloned())
    }

    async fn list_step_runs(&self, run_id: RunId) -> StoreResult<Vec<StepRun>> {
        let state = self.state.read().await;
        let mut step_runs: Vec<StepRun> = state
            .step_runs
            .values()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect();
        step_runs.sort_by_key(|s| s.step_order);
        Ok(step_runs)
    }

    async fn update_step_run(&self, step_run: &StepRun) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.step_runs.contains_key(&step_run.id) {
            return Err(StoreError::new(format!("Unknown step run {}", step_run.id)));
        }
        state.step_runs.insert(step_run.id, step_run.clone());
        Ok(())
    }
}

#[async_trait]
impl ExceptionStore for InMemoryStore {
    async fn insert_batch(&self, exceptions: Vec<ReconException>) -> StoreResult<()> {
        self.state.write().await.exceptions.extend(exceptions);
        Ok(())
    }

    async fn update_suggestion(
        &self,
        exception_id: ExceptionId,
        suggestion: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let exception = state
            .exceptions
            .iter_mut()
            .find(|e| e.id == exception_id)
            .ok_or_else(|| StoreError::new(format!("Unknown exception {exception_id}")))?;
        exception.ai_suggestion = Some(suggestion.to_string());
        Ok(())
    }

    async fn list_for_run(&self, run_id: RunId) -> StoreResult<Vec<ReconException>> {
        Ok(self
            .state
            .read()
            .await
            .exceptions
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect())
    }
}
