//! # Reconciliation Engine
//!
//! Tabular diff engine with exception classification and run lifecycle
//! supervision.
//!
//! This crate provides the infrastructure for:
//! - Composite-key record indexing over parsed tables
//! - Multi-strategy field comparison (exact, fuzzy, range, substring)
//! - Exception classification with severity assignment
//! - Run and step-run state machines with retry and cancellation
//! - Best-effort AI assistance for explanations and potential matches
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────────┐
//! │ TableParser  │────►│ RecordIndexer │────►│    Exception     │
//! │ (src + tgt)  │     │ (composite    │     │   Classifier     │
//! └──────────────┘     │  keys)        │     └────────┬─────────┘
//!                      └───────────────┘              │
//!                                                     ▼
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────────┐
//! │ Lifecycle    │◄────│ Reconciliation│◄────│  ReconSummary +  │
//! │ Manager      │     │   Executor    │     │  ExceptionStore  │
//! └──────────────┘     └───────┬───────┘     └──────────────────┘
//!                              │
//!                      ┌───────▼───────┐
//!                      │   AiAssist    │   (optional, best-effort)
//!                      └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use crosscheck_engine::{
//!     FieldMapping, InMemoryStore, LifecycleManager, ReconJob,
//!     ReconWorker, ReconciliationExecutor, RuleSet, WorkerConfig,
//! };
//!
//! let store = InMemoryStore::shared();
//! let lifecycle = Arc::new(LifecycleManager::new(store.clone()));
//! let executor = Arc::new(ReconciliationExecutor::new(parser, store.clone(), store));
//! let worker = ReconWorker::new(lifecycle, executor, WorkerConfig::default());
//!
//! let handle = worker.submit(run_id, vec![job]);
//! handle.join().await;
//! ```

pub mod assist;
pub mod classify;
pub mod compare;
pub mod exception;
pub mod executor;
pub mod index;
pub mod lifecycle;
pub mod parser;
pub mod record;
pub mod rules;
pub mod statistics;
pub mod store;
pub mod worker;

// Re-exports for convenience
pub use assist::{AiAssist, AssistError, PotentialMatch};
pub use classify::{ClassifierOutcome, ExceptionClassifier};
pub use compare::{ComparatorConfig, FieldComparator};
pub use exception::{ExceptionStatus, ExceptionType, ReconException, Severity};
pub use executor::{
    ExecutionOutcome, ExecutorConfig, ReconError, ReconJob, ReconciliationExecutor,
};
pub use index::{RecordIndexer, Side, NULL_SENTINEL};
pub use lifecycle::{
    LifecycleError, LifecycleManager, LifecycleResult, Run, RunStatus, StepDefinition, StepRun,
    StepRunStatus, Stream,
};
pub use parser::{ParseError, ParsedTable, TableParser};
pub use record::{FieldValue, Record};
pub use rules::{FieldMapping, MatchType, MatchingRule, RuleSet, RuleSetError};
pub use statistics::{LogProgress, Milestone, ProgressSink, ReconSummary};
pub use store::{ExceptionStore, InMemoryStore, RunStore, StoreError, StoreResult};
pub use worker::{JobHandle, ReconWorker, WorkerConfig};
