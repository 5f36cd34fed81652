//! Run summary statistics and progress milestones.

use crosscheck_core::RunId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Summary statistics for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconSummary {
    /// Total source records.
    #[serde(default)]
    pub total_source: usize,
    /// Total target records.
    #[serde(default)]
    pub total_target: usize,
    /// Paired positions with zero field exceptions.
    #[serde(default)]
    pub matched: usize,
    /// Source records without a clean match.
    #[serde(default)]
    pub unmatched_source: usize,
    /// Target records without a clean match.
    #[serde(default)]
    pub unmatched_target: usize,
    /// Total exceptions persisted for the run.
    #[serde(default)]
    pub exceptions_found: usize,
    /// `matched / total_source * 100`, zero for an empty source.
    #[serde(default)]
    pub match_rate: f64,
}

impl ReconSummary {
    /// Compute the summary from raw counts.
    #[must_use]
    pub fn compute(
        total_source: usize,
        total_target: usize,
        matched: usize,
        exceptions_found: usize,
    ) -> Self {
        let match_rate = if total_source == 0 {
            0.0
        } else {
            (matched as f64 / total_source as f64) * 100.0
        };
        Self {
            total_source,
            total_target,
            matched,
            unmatched_source: total_source.saturating_sub(matched),
            unmatched_target: total_target.saturating_sub(matched),
            exceptions_found,
            match_rate,
        }
    }
}

/// Pipeline milestones reported for external progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    /// Source dataset parsed.
    ParseSource,
    /// Target dataset parsed.
    ParseTarget,
    /// Indexing and classification finished.
    DiffComplete,
    /// Exceptions durably written.
    PersistComplete,
}

impl Milestone {
    /// Nominal progress percentage at this milestone.
    #[must_use]
    pub fn percent(&self) -> u8 {
        match self {
            Milestone::ParseSource => 10,
            Milestone::ParseTarget => 25,
            Milestone::DiffComplete => 70,
            Milestone::PersistComplete => 90,
        }
    }
}

impl Display for Milestone {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Milestone::ParseSource => "parse_source",
            Milestone::ParseTarget => "parse_target",
            Milestone::DiffComplete => "diff_complete",
            Milestone::PersistComplete => "persist_complete",
        };
        write!(f, "{s}")
    }
}

/// Sink for milestone progress reports.
///
/// Fire-and-forget: implementations must not fail and must not block the
/// pipeline for long.
pub trait ProgressSink: Send + Sync {
    /// Report that a run reached a milestone.
    fn report(&self, run_id: RunId, milestone: Milestone);
}

/// Progress sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, run_id: RunId, milestone: Milestone) {
        tracing::debug!(
            run_id = %run_id,
            milestone = %milestone,
            percent = milestone.percent(),
            "Reconciliation progress"
        );
    }
}
