//! Field comparison strategies.
//!
//! Pure comparison of one source value against one target value under an
//! optional [`MatchingRule`]. No strategy ever raises an error: coercion
//! failures are mismatches, and an unknown or absent rule falls back to
//! EXACT semantics.

use serde::{Deserialize, Serialize};
use strsim::levenshtein;

use crate::record::FieldValue;
use crate::rules::{MatchType, MatchingRule};

/// Default thresholds applied when a rule omits its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Minimum fuzzy similarity to count as a match.
    #[serde(default = "default_fuzzy_threshold")]
    pub default_fuzzy_threshold: f64,
    /// Absolute tolerance for RANGE matching.
    #[serde(default)]
    pub default_tolerance: f64,
}

fn default_fuzzy_threshold() -> f64 {
    0.8
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            default_fuzzy_threshold: default_fuzzy_threshold(),
            default_tolerance: 0.0,
        }
    }
}

/// Stateless comparator implementing the match strategies.
#[derive(Debug, Clone, Default)]
pub struct FieldComparator {
    config: ComparatorConfig,
}

impl FieldComparator {
    /// Create a comparator with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a comparator with custom thresholds.
    #[must_use]
    pub fn with_config(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Compare a source value against a target value under an optional rule.
    ///
    /// Both null is a match; exactly one null is a mismatch; otherwise the
    /// rule's strategy applies, defaulting to EXACT.
    #[must_use]
    pub fn matches(
        &self,
        source: &FieldValue,
        target: &FieldValue,
        rule: Option<&MatchingRule>,
    ) -> bool {
        if source.is_null() && target.is_null() {
            return true;
        }
        if source.is_null() || target.is_null() {
            return false;
        }

        // Non-null values always render.
        let (Some(source_text), Some(target_text)) = (source.render(), target.render()) else {
            return false;
        };

        match rule.map(|r| r.match_type) {
            None | Some(MatchType::Exact) => source_text == target_text,
            Some(MatchType::Fuzzy) => {
                let threshold = rule
                    .and_then(|r| r.fuzzy_threshold)
                    .unwrap_or(self.config.default_fuzzy_threshold);
                Self::similarity(&source_text, &target_text) >= threshold
            }
            Some(MatchType::Range) => {
                let tolerance = rule
                    .and_then(|r| r.tolerance)
                    .unwrap_or(self.config.default_tolerance);
                match (coerce_numeric(source), coerce_numeric(target)) {
                    (Some(a), Some(b)) => (a - b).abs() <= tolerance,
                    _ => false,
                }
            }
            Some(MatchType::Contains) => {
                let (a, b) = (source_text.to_lowercase(), target_text.to_lowercase());
                a.contains(&b) || b.contains(&a)
            }
            Some(MatchType::StartsWith) => {
                let (a, b) = (source_text.to_lowercase(), target_text.to_lowercase());
                a.starts_with(&b) || b.starts_with(&a)
            }
            Some(MatchType::EndsWith) => {
                let (a, b) = (source_text.to_lowercase(), target_text.to_lowercase());
                a.ends_with(&b) || b.ends_with(&a)
            }
        }
    }

    /// Normalized Levenshtein similarity over lowercased strings.
    ///
    /// `(max_len - edit_distance) / max_len`, symmetric, bounded `[0, 1]`,
    /// `1.0` for identical strings (including two empty strings).
    #[must_use]
    pub fn similarity(a: &str, b: &str) -> f64 {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 1.0;
        }
        let distance = levenshtein(&a, &b);
        (max_len as f64 - distance as f64) / max_len as f64
    }
}

/// Best-effort numeric coercion.
///
/// Numbers pass through; strings are stripped of everything but digits,
/// decimal point, and sign before parsing. Anything else fails coercion.
fn coerce_numeric(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(match_type: MatchType) -> MatchingRule {
        MatchingRule::new("f", "f", match_type)
    }

    #[test]
    fn test_both_null_match() {
        let comparator = FieldComparator::new();
        assert!(comparator.matches(&FieldValue::Null, &FieldValue::Null, None));
    }

    #[test]
    fn test_single_null_mismatch() {
        let comparator = FieldComparator::new();
        assert!(!comparator.matches(&FieldValue::from("a"), &FieldValue::Null, None));
        assert!(!comparator.matches(&FieldValue::Null, &FieldValue::from("a"), None));
    }

    #[test]
    fn test_exact_is_symmetric() {
        let comparator = FieldComparator::new();
        let a = FieldValue::from("alpha");
        let b = FieldValue::from("beta");
        assert_eq!(
            comparator.matches(&a, &b, Some(&rule(MatchType::Exact))),
            comparator.matches(&b, &a, Some(&rule(MatchType::Exact)))
        );
        assert!(comparator.matches(&a, &a.clone(), None));
    }

    #[test]
    fn test_exact_on_string_forms_across_types() {
        let comparator = FieldComparator::new();
        // Number 1.0 renders "1" and matches the text "1".
        assert!(comparator.matches(&FieldValue::Number(1.0), &FieldValue::from("1"), None));
        assert!(!comparator.matches(&FieldValue::Number(1.0), &FieldValue::from("1.0"), None));
    }

    #[test]
    fn test_similarity_identity_and_symmetry() {
        assert!((FieldComparator::similarity("same", "same") - 1.0).abs() < f64::EPSILON);
        assert!((FieldComparator::similarity("", "") - 1.0).abs() < f64::EPSILON);
        let ab = FieldComparator::similarity("kitten", "sitting");
        let ba = FieldComparator::similarity("sitting", "kitten");
        assert!((ab - ba).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_kitten_sitting() {
        // distance 3 over max length 7
        let similarity = FieldComparator::similarity("kitten", "sitting");
        assert!((similarity - 0.571_428).abs() < 0.01);
    }

    #[test]
    fn test_fuzzy_threshold_default() {
        let comparator = FieldComparator::new();
        // similarity("jonathan", "jonathon") = 7/8 = 0.875 >= 0.8
        assert!(comparator.matches(
            &FieldValue::from("Jonathan"),
            &FieldValue::from("Jonathon"),
            Some(&rule(MatchType::Fuzzy)),
        ));
        // kitten/sitting at ~0.57 is below the default threshold
        assert!(!comparator.matches(
            &FieldValue::from("kitten"),
            &FieldValue::from("sitting"),
            Some(&rule(MatchType::Fuzzy)),
        ));
    }

    #[test]
    fn test_fuzzy_rule_threshold_overrides_default() {
        let comparator = FieldComparator::new();
        let lax = rule(MatchType::Fuzzy).with_fuzzy_threshold(0.5);
        assert!(comparator.matches(
            &FieldValue::from("kitten"),
            &FieldValue::from("sitting"),
            Some(&lax),
        ));
    }

    #[test]
    fn test_range_within_tolerance() {
        let comparator = FieldComparator::new();
        let tolerant = rule(MatchType::Range).with_tolerance(0.50);
        assert!(comparator.matches(
            &FieldValue::Number(100.00),
            &FieldValue::Number(100.30),
            Some(&tolerant),
        ));
        assert!(!comparator.matches(
            &FieldValue::Number(100.00),
            &FieldValue::Number(101.00),
            Some(&tolerant),
        ));
    }

    #[test]
    fn test_range_coerces_formatted_strings() {
        let comparator = FieldComparator::new();
        let tolerant = rule(MatchType::Range).with_tolerance(0.01);
        assert!(comparator.matches(
            &FieldValue::from("$1,234.50"),
            &FieldValue::Number(1234.50),
            Some(&tolerant),
        ));
    }

    #[test]
    fn test_range_coercion_failure_is_mismatch() {
        let comparator = FieldComparator::new();
        assert!(!comparator.matches(
            &FieldValue::from("not a number"),
            &FieldValue::Number(1.0),
            Some(&rule(MatchType::Range)),
        ));
    }

    #[test]
    fn test_range_default_tolerance_is_zero() {
        let comparator = FieldComparator::new();
        assert!(comparator.matches(
            &FieldValue::Number(5.0),
            &FieldValue::from("5"),
            Some(&rule(MatchType::Range)),
        ));
        assert!(!comparator.matches(
            &FieldValue::Number(5.0),
            &FieldValue::Number(5.01),
            Some(&rule(MatchType::Range)),
        ));
    }

    #[test]
    fn test_contains_is_bidirectional_and_case_insensitive() {
        let comparator = FieldComparator::new();
        let contains = rule(MatchType::Contains);
        assert!(comparator.matches(
            &FieldValue::from("ACME Corp"),
            &FieldValue::from("acme"),
            Some(&contains),
        ));
        assert!(comparator.matches(
            &FieldValue::from("acme"),
            &FieldValue::from("ACME Corp"),
            Some(&contains),
        ));
    }

    #[test]
    fn test_starts_with_bidirectional() {
        let comparator = FieldComparator::new();
        let starts = rule(MatchType::StartsWith);
        assert!(comparator.matches(
            &FieldValue::from("INV-2024-001"),
            &FieldValue::from("inv-2024"),
            Some(&starts),
        ));
        assert!(!comparator.matches(
            &FieldValue::from("INV-2024-001"),
            &FieldValue::from("2024"),
            Some(&starts),
        ));
    }

    #[test]
    fn test_ends_with_bidirectional() {
        let comparator = FieldComparator::new();
        let ends = rule(MatchType::EndsWith);
        assert!(comparator.matches(
            &FieldValue::from("branch/main"),
            &FieldValue::from("MAIN"),
            Some(&ends),
        ));
        assert!(!comparator.matches(
            &FieldValue::from("branch/main"),
            &FieldValue::from("branch"),
            Some(&ends),
        ));
    }

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric(&FieldValue::from("1,234")), Some(1234.0));
        assert_eq!(coerce_numeric(&FieldValue::from("€99.95")), Some(99.95));
        assert_eq!(coerce_numeric(&FieldValue::from("-42")), Some(-42.0));
        assert_eq!(coerce_numeric(&FieldValue::Bool(true)), None);
        assert_eq!(coerce_numeric(&FieldValue::from("abc")), None);
    }
}
