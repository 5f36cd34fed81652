//! Reconciliation executor.
//!
//! Drives a full diff pass: parse both tables, index on composite keys,
//! classify exceptions, compute the run summary, persist exceptions, and
//! hand the result to the optional AI collaborator. Cancellation is
//! cooperative: the executor re-reads run status at pipeline checkpoints
//! and stops cleanly when a cancel has landed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crosscheck_core::RunId;

use crate::assist::AiAssist;
use crate::compare::{ComparatorConfig, FieldComparator};
use crate::classify::ExceptionClassifier;
use crate::exception::{ExceptionType, ReconException, Severity};
use crate::index::{RecordIndexer, Side};
use crate::lifecycle::RunStatus;
use crate::parser::{ParseError, TableParser};
use crate::record::Record;
use crate::rules::{RuleSet, RuleSetError};
use crate::statistics::{LogProgress, Milestone, ProgressSink, ReconSummary};
use crate::store::{ExceptionStore, RunStore, StoreError};

/// Executor tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Exceptions persisted per storage write.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Cap on AI explanations requested per run.
    #[serde(default = "default_max_ai_explanations")]
    pub max_ai_explanations: usize,
    /// Skip potential-match discovery when more records than this are
    /// missing on either side.
    #[serde(default = "default_potential_match_limit")]
    pub potential_match_limit: usize,
    /// Separator between composite key parts.
    #[serde(default = "default_key_separator")]
    pub key_separator: String,
    /// Field comparison defaults.
    #[serde(default)]
    pub comparator: ComparatorConfig,
}

fn default_batch_size() -> usize {
    10
}

fn default_max_ai_explanations() -> usize {
    50
}

fn default_potential_match_limit() -> usize {
    200
}

fn default_key_separator() -> String {
    "|".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_ai_explanations: default_max_ai_explanations(),
            potential_match_limit: default_potential_match_limit(),
            key_separator: default_key_separator(),
            comparator: ComparatorConfig::default(),
        }
    }
}

/// One reconciliation job to execute.
#[derive(Debug, Clone)]
pub struct ReconJob {
    /// The run this job executes under.
    pub run_id: RunId,
    /// Field mappings and matching rules to apply.
    pub rule_set: RuleSet,
    /// Where to read the source table from.
    pub source_locator: String,
    /// Where to read the target table from.
    pub target_locator: String,
}

/// How a job ended.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The diff ran to completion.
    Completed(ReconSummary),
    /// A cancel landed at a checkpoint; partial results were discarded.
    Canceled,
}

/// Errors from job execution.
#[derive(Debug, Error)]
pub enum ReconError {
    /// The rule set failed validation.
    #[error(transparent)]
    InvalidRuleSet(#[from] RuleSetError),

    /// A source or target table could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs reconciliation jobs end-to-end.
pub struct ReconciliationExecutor {
    parser: Arc<dyn TableParser>,
    exceptions: Arc<dyn ExceptionStore>,
    runs: Arc<dyn RunStore>,
    assist: Option<Arc<dyn AiAssist>>,
    progress: Arc<dyn ProgressSink>,
    config: ExecutorConfig,
}

impl ReconciliationExecutor {
    /// Create an executor with default config and log-only progress.
    #[must_use]
    pub fn new(
        parser: Arc<dyn TableParser>,
        exceptions: Arc<dyn ExceptionStore>,
        runs: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            parser,
            exceptions,
            runs,
            assist: None,
            progress: Arc::new(LogProgress),
            config: ExecutorConfig::default(),
        }
    }

    /// Attach an AI-assist collaborator.
    #[must_use]
    pub fn with_assist(mut self, assist: Arc<dyn AiAssist>) -> Self {
        self.assist = Some(assist);
        self
    }

    /// Replace the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the config.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute one reconciliation job.
    #[instrument(skip_all, fields(run_id = %job.run_id))]
    pub async fn execute(&self, job: &ReconJob) -> Result<ExecutionOutcome, ReconError> {
        job.rule_set.validate()?;

        if self.is_canceled(job.run_id).await? {
            return Ok(ExecutionOutcome::Canceled);
        }

        let source_table = self.parser.parse(&job.source_locator).await?;
        self.progress.report(job.run_id, Milestone::ParseSource);

        let target_table = self.parser.parse(&job.target_locator).await?;
        self.progress.report(job.run_id, Milestone::ParseTarget);

        if self.is_canceled(job.run_id).await? {
            return Ok(ExecutionOutcome::Canceled);
        }

        let source_records = source_table.into_records();
        let target_records = target_table.into_records();

        let indexer = RecordIndexer::new(job.rule_set.key_mappings(), &self.config.key_separator);
        let source_index = indexer.index(&source_records, Side::Source);
        let target_index = indexer.index(&target_records, Side::Target);

        let comparator = FieldComparator::with_config(self.config.comparator.clone());
        let classifier = ExceptionClassifier::new(&job.rule_set, &comparator);
        let outcome = classifier.classify(job.run_id, &source_index, &target_index);

        let summary = ReconSummary::compute(
            source_records.len(),
            target_records.len(),
            outcome.matched,
            outcome.exceptions.len(),
        );
        self.progress.report(job.run_id, Milestone::DiffComplete);

        if self.is_canceled(job.run_id).await? {
            return Ok(ExecutionOutcome::Canceled);
        }

        let exceptions = outcome.exceptions;
        for chunk in exceptions.chunks(self.config.batch_size) {
            self.exceptions.insert_batch(chunk.to_vec()).await?;
        }
        self.progress.report(job.run_id, Milestone::PersistComplete);

        if let Some(assist) = &self.assist {
            self.explain_exceptions(assist, &exceptions).await;
            self.discover_potential_matches(assist, job, &exceptions)
                .await?;
        }

        info!(
            matched = summary.matched,
            exceptions = summary.exceptions_found,
            match_rate = summary.match_rate,
            "Reconciliation complete"
        );
        Ok(ExecutionOutcome::Completed(summary))
    }

    /// Request explanations for the first exceptions, up to the configured
    /// cap. Assist failures are logged and skipped.
    async fn explain_exceptions(&self, assist: &Arc<dyn AiAssist>, exceptions: &[ReconException]) {
        for exception in exceptions.iter().take(self.config.max_ai_explanations) {
            match assist.explain_exception(exception).await {
                Ok(explanation) => {
                    if let Err(err) = self
                        .exceptions
                        .update_suggestion(exception.id, &explanation)
                        .await
                    {
                        warn!(
                            exception_id = %exception.id,
                            error = %err,
                            "Failed to persist AI explanation"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        exception_id = %exception.id,
                        error = %err,
                        "AI explanation failed, skipping"
                    );
                }
            }
        }
    }

    /// Ask the assist collaborator to pair up unmatched records. Skipped
    /// when nothing is missing or when too many records are missing to be
    /// worth a pass.
    async fn discover_potential_matches(
        &self,
        assist: &Arc<dyn AiAssist>,
        job: &ReconJob,
        exceptions: &[ReconException],
    ) -> Result<(), ReconError> {
        let unmatched_source: Vec<Record> = exceptions
            .iter()
            .filter(|e| e.exception_type == ExceptionType::MissingTarget)
            .filter_map(|e| e.source_record.clone())
            .collect();
        let unmatched_target: Vec<Record> = exceptions
            .iter()
            .filter(|e| e.exception_type == ExceptionType::MissingSource)
            .filter_map(|e| e.target_record.clone())
            .collect();

        let missing = unmatched_source.len() + unmatched_target.len();
        if missing == 0 || missing > self.config.potential_match_limit {
            debug!(missing, "Skipping potential-match discovery");
            return Ok(());
        }

        let candidates = match assist
            .find_potential_matches(
                &unmatched_source,
                &unmatched_target,
                &job.rule_set.field_mappings,
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "Potential-match discovery failed, skipping");
                return Ok(());
            }
        };

        let mut discovered = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let suggestion = format!(
                "Potential match (confidence {:.2}): {}",
                candidate.confidence, candidate.reasoning
            );
            discovered.push(
                ReconException::new(job.run_id, ExceptionType::PotentialMatch, Severity::Medium)
                    .with_source_record(candidate.source_record)
                    .with_target_record(candidate.target_record)
                    .with_suggestion(suggestion),
            );
        }

        if !discovered.is_empty() {
            info!(count = discovered.len(), "Recorded potential matches");
            for chunk in discovered.chunks(self.config.batch_size) {
                self.exceptions.insert_batch(chunk.to_vec()).await?;
            }
        }
        Ok(())
    }

    /// A missing run record means the job runs outside lifecycle
    /// supervision and can never be canceled.
    async fn is_canceled(&self, run_id: RunId) -> Result<bool, StoreError> {
        Ok(self
            .runs
            .get_run(run_id)
            .await?
            .is_some_and(|run| run.status == RunStatus::Canceled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_ai_explanations, 50);
        assert_eq!(config.potential_match_limit, 200);
        assert_eq!(config.key_separator, "|");
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ExecutorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.comparator.default_fuzzy_threshold, 0.8);
    }
}
