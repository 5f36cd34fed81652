//! Rule sets: field mappings and matching rules.
//!
//! A [`RuleSet`] bundles the field mappings and per-field matching rules for
//! one reconciliation job. Validation is fail-fast: a rule set with no key
//! mapping can never bucket records and is rejected before any work starts.

use crosscheck_core::RuleSetId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Correspondence between a source field and a target field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Field name on the source side.
    pub source_field: String,
    /// Field name on the target side.
    pub target_field: String,
    /// Whether this mapping participates in key building.
    #[serde(default)]
    pub is_key: bool,
    /// Optional transformation expression, executed by an external
    /// transformation collaborator. Carried as opaque configuration here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Mapping confidence, when the mapping was suggested rather than
    /// hand-written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl FieldMapping {
    /// Create a plain (non-key) mapping.
    #[must_use]
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            is_key: false,
            transform: None,
            confidence: None,
        }
    }

    /// Create a key mapping.
    #[must_use]
    pub fn key(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        let mut mapping = Self::new(source_field, target_field);
        mapping.is_key = true;
        mapping
    }
}

/// Comparison strategy for a matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// String forms must be equal.
    Exact,
    /// Normalized Levenshtein similarity above a threshold.
    Fuzzy,
    /// Numeric difference within a tolerance.
    Range,
    /// Either value contains the other (case-insensitive).
    Contains,
    /// Either value is a prefix of the other (case-insensitive).
    StartsWith,
    /// Either value is a suffix of the other (case-insensitive).
    EndsWith,
}

impl Display for MatchType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchType::Exact => "EXACT",
            MatchType::Fuzzy => "FUZZY",
            MatchType::Range => "RANGE",
            MatchType::Contains => "CONTAINS",
            MatchType::StartsWith => "STARTS_WITH",
            MatchType::EndsWith => "ENDS_WITH",
        };
        write!(f, "{s}")
    }
}

/// Per-field comparison strategy with its tolerance and threshold knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingRule {
    /// Field name on the source side this rule applies to.
    pub source_field: String,
    /// Field name on the target side.
    pub target_field: String,
    /// The comparison strategy.
    pub match_type: MatchType,
    /// Absolute tolerance for RANGE matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    /// Similarity threshold for FUZZY matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy_threshold: Option<f64>,
    /// Inactive rules are ignored.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Higher priority wins when multiple rules name the same field.
    #[serde(default)]
    pub priority: i32,
}

fn default_active() -> bool {
    true
}

impl MatchingRule {
    /// Create an active rule with default priority.
    #[must_use]
    pub fn new(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        match_type: MatchType,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            match_type,
            tolerance: None,
            fuzzy_threshold: None,
            active: true,
            priority: 0,
        }
    }

    /// Set the RANGE tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Set the FUZZY threshold.
    #[must_use]
    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = Some(threshold);
        self
    }
}

/// Error raised when a rule set cannot drive a reconciliation.
#[derive(Debug, Clone, Error, Serialize)]
#[error("Invalid rule set: {reason}")]
pub struct RuleSetError {
    /// Why the rule set was rejected.
    pub reason: String,
}

/// The configuration bundle for one reconciliation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rule set ID.
    pub id: RuleSetId,
    /// Human-readable name.
    pub name: String,
    /// Field correspondences; at least one must be a key mapping.
    pub field_mappings: Vec<FieldMapping>,
    /// Per-field matching rules; at most one active rule applies per source
    /// field, absence implies EXACT.
    #[serde(default)]
    pub matching_rules: Vec<MatchingRule>,
}

impl RuleSet {
    /// Create a rule set from mappings and rules.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        field_mappings: Vec<FieldMapping>,
        matching_rules: Vec<MatchingRule>,
    ) -> Self {
        Self {
            id: RuleSetId::new(),
            name: name.into(),
            field_mappings,
            matching_rules,
        }
    }

    /// Fail-fast validation: at least one key mapping must exist.
    pub fn validate(&self) -> Result<(), RuleSetError> {
        if !self.field_mappings.iter().any(|m| m.is_key) {
            return Err(RuleSetError {
                reason: "at least one field mapping must be marked as a key".to_string(),
            });
        }
        Ok(())
    }

    /// The key mappings, in declaration order. Key order defines key-string
    /// construction, so order matters.
    #[must_use]
    pub fn key_mappings(&self) -> Vec<FieldMapping> {
        self.field_mappings
            .iter()
            .filter(|m| m.is_key)
            .cloned()
            .collect()
    }

    /// The active rule for a source field, highest priority first.
    ///
    /// Returns `None` when no active rule names the field, which implies
    /// EXACT comparison.
    #[must_use]
    pub fn active_rule_for(&self, source_field: &str) -> Option<&MatchingRule> {
        self.matching_rules
            .iter()
            .filter(|r| r.active && r.source_field == source_field)
            .max_by_key(|r| r.priority)
    }
}
