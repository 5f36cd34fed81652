//! Field values and records.
//!
//! A [`Record`] is an ordered bag of named, typed field values produced by an
//! external tabular parser. Records are immutable once built; the diff engine
//! only ever reads them.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A typed field value.
///
/// The tagged union covers the value kinds the parser collaborator can
/// produce. Comparison semantics live in the comparator; this type only
/// knows how to render itself as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Timestamp value.
    Temporal(DateTime<Utc>),
    /// Absent or explicitly null value.
    Null,
}

static NULL_VALUE: FieldValue = FieldValue::Null;

impl FieldValue {
    /// Whether this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Render the value as text, or `None` for null.
    ///
    /// Numbers use Rust's `f64` display (`1.0` renders as `"1"`), temporals
    /// render as RFC 3339. Key building and EXACT comparison both go through
    /// this rendering, so it must stay deterministic.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Temporal(t) => Some(t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            FieldValue::Null => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// An immutable ordered mapping from field name to typed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from parallel header and value slices.
    ///
    /// Extra headers beyond the row length read as null; extra values beyond
    /// the header length are dropped.
    #[must_use]
    pub fn from_row(headers: &[String], row: Vec<FieldValue>) -> Self {
        let mut values = row.into_iter();
        let fields = headers
            .iter()
            .map(|h| (h.clone(), values.next().unwrap_or(FieldValue::Null)))
            .collect();
        Self { fields }
    }

    /// Builder-style field insertion, for construction and tests.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Look up a field, treating absence as null.
    #[must_use]
    pub fn value_of(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&NULL_VALUE)
    }

    /// Whether the record carries the named field at all.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}
