//! Record indexing by composite key.
//!
//! Buckets records by the concatenated string form of their key-field
//! values. Insertion order is preserved both across keys and within a
//! bucket; the classifier's positional pairing depends on it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::rules::FieldMapping;

/// Sentinel rendered into the key for an absent or null key field.
///
/// A field whose actual value is the literal text `"null"` collides with a
/// genuinely absent field. That ambiguity is inherited behavior and pinned
/// by test rather than fixed.
pub const NULL_SENTINEL: &str = "null";

/// Which side of a field mapping to read when keying a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Read `source_field` names.
    Source,
    /// Read `target_field` names.
    Target,
}

impl Side {
    /// The field name this side reads from a mapping.
    #[must_use]
    pub fn field_of<'a>(&self, mapping: &'a FieldMapping) -> &'a str {
        match self {
            Side::Source => &mapping.source_field,
            Side::Target => &mapping.target_field,
        }
    }
}

/// Builds keyed indices over parsed records.
#[derive(Debug, Clone)]
pub struct RecordIndexer {
    key_mappings: Vec<FieldMapping>,
    separator: String,
}

impl RecordIndexer {
    /// Create an indexer over the given key mappings.
    ///
    /// Mapping order defines key construction order.
    #[must_use]
    pub fn new(key_mappings: Vec<FieldMapping>, separator: impl Into<String>) -> Self {
        Self {
            key_mappings,
            separator: separator.into(),
        }
    }

    /// Build the composite key for a single record.
    #[must_use]
    pub fn key_for(&self, record: &Record, side: Side) -> String {
        self.key_mappings
            .iter()
            .map(|mapping| {
                record
                    .value_of(side.field_of(mapping))
                    .render()
                    .unwrap_or_else(|| NULL_SENTINEL.to_string())
            })
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// Index records into key → bucket, preserving insertion order.
    #[must_use]
    pub fn index(&self, records: &[Record], side: Side) -> IndexMap<String, Vec<Record>> {
        let mut index: IndexMap<String, Vec<Record>> = IndexMap::new();
        for record in records {
            let key = self.key_for(record, side);
            index.entry(key).or_default().push(record.clone());
        }
        index
    }
}
