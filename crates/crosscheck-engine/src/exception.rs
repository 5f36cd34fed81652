//! Reconciliation exceptions.
//!
//! An exception is a persisted record of one detected discrepancy between
//! the source and target datasets. Exceptions are created exclusively by
//! the classifier and executor; later status changes belong to case
//! management, which is outside this crate.

use chrono::{DateTime, Utc};
use crosscheck_core::{ExceptionId, RunId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::record::{FieldValue, Record};

/// Discrepancy classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionType {
    /// A target record has no source counterpart.
    MissingSource,
    /// A source record has no target counterpart.
    MissingTarget,
    /// Paired records disagree on a mapped field.
    ValueMismatch,
    /// Extra record sharing an already-paired key.
    Duplicate,
    /// AI-suggested pairing of otherwise unmatched records.
    PotentialMatch,
    /// A value could not be interpreted under its expected format.
    FormatError,
    /// A numeric difference exceeded the configured tolerance.
    ToleranceExceeded,
}

impl Display for ExceptionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExceptionType::MissingSource => "MISSING_SOURCE",
            ExceptionType::MissingTarget => "MISSING_TARGET",
            ExceptionType::ValueMismatch => "VALUE_MISMATCH",
            ExceptionType::Duplicate => "DUPLICATE",
            ExceptionType::PotentialMatch => "POTENTIAL_MATCH",
            ExceptionType::FormatError => "FORMAT_ERROR",
            ExceptionType::ToleranceExceeded => "TOLERANCE_EXCEEDED",
        };
        write!(f, "{s}")
    }
}

/// How serious a discrepancy is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// Case-management status of an exception.
///
/// Exceptions are created `Open`; the remaining states are mutated by the
/// out-of-scope case-management layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionStatus {
    Open,
    Resolved,
    Ignored,
}

/// One detected discrepancy between source and target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconException {
    /// Exception ID.
    pub id: ExceptionId,
    /// The run that produced this exception.
    pub run_id: RunId,
    /// Discrepancy classification.
    pub exception_type: ExceptionType,
    /// Severity tag.
    pub severity: Severity,
    /// Case-management status; always `Open` at creation.
    pub status: ExceptionStatus,
    /// The mapped field involved, for field-scoped exceptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// The source-side value involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_value: Option<FieldValue>,
    /// The target-side value involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_value: Option<FieldValue>,
    /// The full source record, when one is implicated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_record: Option<Record>,
    /// The full target record, when one is implicated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_record: Option<Record>,
    /// Best-effort AI annotation (explanation or match reasoning).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_suggestion: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ReconException {
    /// Create an open exception of the given type and severity.
    #[must_use]
    pub fn new(run_id: RunId, exception_type: ExceptionType, severity: Severity) -> Self {
        Self {
            id: ExceptionId::new(),
            run_id,
            exception_type,
            severity,
            status: ExceptionStatus::Open,
            field_name: None,
            source_value: None,
            target_value: None,
            source_record: None,
            target_record: None,
            ai_suggestion: None,
            created_at: Utc::now(),
        }
    }

    /// Scope the exception to a mapped field.
    #[must_use]
    pub fn with_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Attach the compared values.
    #[must_use]
    pub fn with_values(mut self, source: FieldValue, target: FieldValue) -> Self {
        self.source_value = Some(source);
        self.target_value = Some(target);
        self
    }

    /// Attach the implicated source record.
    #[must_use]
    pub fn with_source_record(mut self, record: Record) -> Self {
        self.source_record = Some(record);
        self
    }

    /// Attach the implicated target record.
    #[must_use]
    pub fn with_target_record(mut self, record: Record) -> Self {
        self.target_record = Some(record);
        self
    }

    /// Attach an AI annotation.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.ai_suggestion = Some(suggestion.into());
        self
    }

    /// Whether this exception reports a missing record on either side.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(
            self.exception_type,
            ExceptionType::MissingSource | ExceptionType::MissingTarget
        )
    }
}
