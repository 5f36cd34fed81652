//! Exception classification.
//!
//! Turns the two keyed indices into typed exceptions and a matched-pair
//! count. Pairing within a shared key bucket is positional: the i-th source
//! record pairs with the i-th target record in insertion order. That
//! tie-break is arbitrary but deterministic, and downstream outputs depend
//! on it staying exactly this way.

use indexmap::IndexMap;

use crate::compare::FieldComparator;
use crate::exception::{ExceptionType, ReconException, Severity};
use crate::record::Record;
use crate::rules::RuleSet;
use crosscheck_core::RunId;

/// Output of one classification pass.
#[derive(Debug, Clone, Default)]
pub struct ClassifierOutcome {
    /// All exceptions found, in detection order.
    pub exceptions: Vec<ReconException>,
    /// Number of paired positions with zero field exceptions.
    pub matched: usize,
}

/// Classifies index-diff results into exceptions.
pub struct ExceptionClassifier<'a> {
    rule_set: &'a RuleSet,
    comparator: &'a FieldComparator,
}

impl<'a> ExceptionClassifier<'a> {
    /// Create a classifier over a rule set and comparator.
    #[must_use]
    pub fn new(rule_set: &'a RuleSet, comparator: &'a FieldComparator) -> Self {
        Self {
            rule_set,
            comparator,
        }
    }

    /// Classify the diff between a source index and a target index.
    #[must_use]
    pub fn classify(
        &self,
        run_id: RunId,
        source_index: &IndexMap<String, Vec<Record>>,
        target_index: &IndexMap<String, Vec<Record>>,
    ) -> ClassifierOutcome {
        let mut outcome = ClassifierOutcome::default();

        for (key, source_bucket) in source_index {
            match target_index.get(key) {
                None => {
                    // Entire source bucket has no target counterpart.
                    for record in source_bucket {
                        outcome.exceptions.push(
                            ReconException::new(
                                run_id,
                                ExceptionType::MissingTarget,
                                Severity::High,
                            )
                            .with_source_record(record.clone()),
                        );
                    }
                }
                Some(target_bucket) => {
                    self.classify_bucket_pair(run_id, source_bucket, target_bucket, &mut outcome);
                }
            }
        }

        for (key, target_bucket) in target_index {
            if !source_index.contains_key(key) {
                for record in target_bucket {
                    outcome.exceptions.push(
                        ReconException::new(run_id, ExceptionType::MissingSource, Severity::High)
                            .with_target_record(record.clone()),
                    );
                }
            }
        }

        outcome
    }

    /// Pair two buckets positionally and diff the overlapping positions.
    fn classify_bucket_pair(
        &self,
        run_id: RunId,
        source_bucket: &[Record],
        target_bucket: &[Record],
        outcome: &mut ClassifierOutcome,
    ) {
        let overlap = source_bucket.len().min(target_bucket.len());

        for i in 0..overlap {
            let field_exceptions =
                self.compare_pair(run_id, &source_bucket[i], &target_bucket[i]);
            if field_exceptions.is_empty() {
                outcome.matched += 1;
            } else {
                outcome.exceptions.extend(field_exceptions);
            }
        }

        for record in &source_bucket[overlap..] {
            outcome.exceptions.push(
                ReconException::new(run_id, ExceptionType::Duplicate, Severity::High)
                    .with_source_record(record.clone()),
            );
        }
        for record in &target_bucket[overlap..] {
            outcome.exceptions.push(
                ReconException::new(run_id, ExceptionType::Duplicate, Severity::High)
                    .with_target_record(record.clone()),
            );
        }
    }

    /// Field-by-field comparison of one paired record.
    fn compare_pair(
        &self,
        run_id: RunId,
        source: &Record,
        target: &Record,
    ) -> Vec<ReconException> {
        let mut exceptions = Vec::new();

        for mapping in &self.rule_set.field_mappings {
            let source_value = source.value_of(&mapping.source_field);
            let target_value = target.value_of(&mapping.target_field);

            if mapping.is_key && (source_value.is_null() || target_value.is_null()) {
                // A null key field is reported as missing on whichever side
                // is null; no further comparison for this field.
                if source_value.is_null() {
                    exceptions.push(
                        ReconException::new(
                            run_id,
                            ExceptionType::MissingSource,
                            Severity::Critical,
                        )
                        .with_field(&mapping.source_field)
                        .with_source_record(source.clone())
                        .with_target_record(target.clone()),
                    );
                }
                if target_value.is_null() {
                    exceptions.push(
                        ReconException::new(
                            run_id,
                            ExceptionType::MissingTarget,
                            Severity::Critical,
                        )
                        .with_field(&mapping.target_field)
                        .with_source_record(source.clone())
                        .with_target_record(target.clone()),
                    );
                }
                continue;
            }

            let rule = self.rule_set.active_rule_for(&mapping.source_field);
            if !self.comparator.matches(source_value, target_value, rule) {
                let severity = if mapping.is_key {
                    Severity::Critical
                } else {
                    Severity::Medium
                };
                exceptions.push(
                    ReconException::new(run_id, ExceptionType::ValueMismatch, severity)
                        .with_field(&mapping.source_field)
                        .with_values(source_value.clone(), target_value.clone())
                        .with_source_record(source.clone())
                        .with_target_record(target.clone()),
                );
            }
        }

        exceptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{RecordIndexer, Side};
    use crate::rules::{FieldMapping, MatchType, MatchingRule};

    fn simple_rule_set() -> RuleSet {
        RuleSet::new(
            "test",
            vec![FieldMapping::key("id", "id"), FieldMapping::new("amount", "amount")],
            vec![],
        )
    }

    fn classify(
        rule_set: &RuleSet,
        source: &[Record],
        target: &[Record],
    ) -> ClassifierOutcome {
        let indexer = RecordIndexer::new(rule_set.key_mappings(), "|");
        let comparator = FieldComparator::new();
        let classifier = ExceptionClassifier::new(rule_set, &comparator);
        classifier.classify(
            RunId::new(),
            &indexer.index(source, Side::Source),
            &indexer.index(target, Side::Target),
        )
    }

    #[test]
    fn test_matching_pair_counts_as_match() {
        let rule_set = simple_rule_set();
        let source = vec![Record::new().with("id", 1i64).with("amount", 10.0)];
        let target = vec![Record::new().with("id", 1i64).with("amount", 10.0)];
        let outcome = classify(&rule_set, &source, &target);
        assert_eq!(outcome.matched, 1);
        assert!(outcome.exceptions.is_empty());
    }

    #[test]
    fn test_missing_target_per_source_record() {
        let rule_set = simple_rule_set();
        let source = vec![
            Record::new().with("id", 1i64).with("amount", 10.0),
            Record::new().with("id", 2i64).with("amount", 20.0),
        ];
        let target = vec![Record::new().with("id", 1i64).with("amount", 10.0)];
        let outcome = classify(&rule_set, &source, &target);

        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.exceptions.len(), 1);
        let exception = &outcome.exceptions[0];
        assert_eq!(exception.exception_type, ExceptionType::MissingTarget);
        assert_eq!(exception.severity, Severity::High);
        assert!(exception.source_record.is_some());
        assert!(exception.target_record.is_none());
    }

    #[test]
    fn test_missing_source_per_target_record() {
        let rule_set = simple_rule_set();
        let source = vec![];
        let target = vec![
            Record::new().with("id", 7i64).with("amount", 1.0),
            Record::new().with("id", 8i64).with("amount", 2.0),
        ];
        let outcome = classify(&rule_set, &source, &target);

        assert_eq!(outcome.matched, 0);
        assert_eq!(outcome.exceptions.len(), 2);
        assert!(outcome
            .exceptions
            .iter()
            .all(|e| e.exception_type == ExceptionType::MissingSource
                && e.target_record.is_some()));
    }

    #[test]
    fn test_extra_source_record_is_duplicate_tagged_to_source() {
        let rule_set = simple_rule_set();
        let source = vec![
            Record::new().with("id", 1i64).with("amount", 10.0),
            Record::new().with("id", 1i64).with("amount", 10.0),
        ];
        let target = vec![Record::new().with("id", 1i64).with("amount", 10.0)];
        let outcome = classify(&rule_set, &source, &target);

        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.exceptions.len(), 1);
        let exception = &outcome.exceptions[0];
        assert_eq!(exception.exception_type, ExceptionType::Duplicate);
        assert_eq!(exception.severity, Severity::High);
        assert!(exception.source_record.is_some());
        assert!(exception.target_record.is_none());
    }

    #[test]
    fn test_extra_target_record_is_duplicate_tagged_to_target() {
        let rule_set = simple_rule_set();
        let source = vec![Record::new().with("id", 1i64).with("amount", 10.0)];
        let target = vec![
            Record::new().with("id", 1i64).with("amount", 10.0),
            Record::new().with("id", 1i64).with("amount", 10.0),
        ];
        let outcome = classify(&rule_set, &source, &target);

        assert_eq!(outcome.exceptions.len(), 1);
        let exception = &outcome.exceptions[0];
        assert_eq!(exception.exception_type, ExceptionType::Duplicate);
        assert!(exception.target_record.is_some());
        assert!(exception.source_record.is_none());
    }

    #[test]
    fn test_positional_pairing_is_by_insertion_order() {
        // Two source and two target records under one key: first pairs with
        // first, second with second. The amounts only line up under that
        // pairing, so matched == 2 proves the order.
        let rule_set = simple_rule_set();
        let source = vec![
            Record::new().with("id", 1i64).with("amount", 10.0),
            Record::new().with("id", 1i64).with("amount", 20.0),
        ];
        let target = vec![
            Record::new().with("id", 1i64).with("amount", 10.0),
            Record::new().with("id", 1i64).with("amount", 20.0),
        ];
        let outcome = classify(&rule_set, &source, &target);
        assert_eq!(outcome.matched, 2);
        assert!(outcome.exceptions.is_empty());
    }

    #[test]
    fn test_value_mismatch_severity_by_key_flag() {
        // Mismatch on a non-key field is MEDIUM.
        let rule_set = simple_rule_set();
        let source = vec![Record::new().with("id", 1i64).with("amount", 10.0)];
        let target = vec![Record::new().with("id", 1i64).with("amount", 99.0)];
        let outcome = classify(&rule_set, &source, &target);

        assert_eq!(outcome.matched, 0);
        assert_eq!(outcome.exceptions.len(), 1);
        let exception = &outcome.exceptions[0];
        assert_eq!(exception.exception_type, ExceptionType::ValueMismatch);
        assert_eq!(exception.severity, Severity::Medium);
        assert_eq!(exception.field_name.as_deref(), Some("amount"));
    }

    #[test]
    fn test_null_key_field_in_paired_record_is_critical() {
        // Both records key to "null" via the sentinel and pair up; the null
        // side of the key field is then reported at CRITICAL.
        let rule_set = RuleSet::new(
            "test",
            vec![FieldMapping::key("id", "id")],
            vec![],
        );
        let source = vec![Record::new().with("other", 1i64)];
        let target = vec![Record::new().with("id", "null")];
        let outcome = classify(&rule_set, &source, &target);

        assert_eq!(outcome.matched, 0);
        assert_eq!(outcome.exceptions.len(), 1);
        let exception = &outcome.exceptions[0];
        assert_eq!(exception.exception_type, ExceptionType::MissingSource);
        assert_eq!(exception.severity, Severity::Critical);
        assert_eq!(exception.field_name.as_deref(), Some("id"));
    }

    #[test]
    fn test_matching_rule_applies_to_paired_fields() {
        let rule_set = RuleSet::new(
            "test",
            vec![
                FieldMapping::key("id", "id"),
                FieldMapping::new("amount", "amount"),
            ],
            vec![MatchingRule::new("amount", "amount", MatchType::Range).with_tolerance(0.5)],
        );
        let source = vec![Record::new().with("id", 1i64).with("amount", 100.0)];
        let target = vec![Record::new().with("id", 1i64).with("amount", 100.3)];
        let outcome = classify(&rule_set, &source, &target);
        assert_eq!(outcome.matched, 1);
        assert!(outcome.exceptions.is_empty());
    }
}
