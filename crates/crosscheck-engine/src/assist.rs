//! AI-assist collaborator contract.
//!
//! Exception explanation and potential-match discovery are best-effort
//! services. The executor wires them as an optional collaborator; every
//! failure here is caught, logged, and skipped, never propagated to job
//! status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exception::ReconException;
use crate::record::Record;
use crate::rules::FieldMapping;

/// Error surfaced by an AI-assist collaborator. Always non-fatal.
#[derive(Debug, Clone, Error, Serialize)]
#[error("AI assist error: {message}")]
pub struct AssistError {
    /// What went wrong, as reported by the assist service.
    pub message: String,
}

impl AssistError {
    /// Create an assist error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An AI-suggested pairing of two otherwise unmatched records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialMatch {
    /// The unmatched source record.
    pub source_record: Record,
    /// The unmatched target record.
    pub target_record: Record,
    /// Match confidence in `[0, 1]`.
    pub confidence: f64,
    /// Why the assist service considers these a pair.
    pub reasoning: String,
}

/// Best-effort AI collaborator.
#[async_trait]
pub trait AiAssist: Send + Sync {
    /// Produce a human-readable explanation for an exception.
    async fn explain_exception(&self, exception: &ReconException) -> Result<String, AssistError>;

    /// Search two unmatched record sets for likely pairs.
    async fn find_potential_matches(
        &self,
        unmatched_source: &[Record],
        unmatched_target: &[Record],
        mappings: &[FieldMapping],
    ) -> Result<Vec<PotentialMatch>, AssistError>;
}
