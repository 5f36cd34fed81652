//! Tabular parser collaborator contract.
//!
//! Parsing files into rows is external to this crate; the executor only
//! consumes the parsed shape. Any parser failure is job-fatal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{FieldValue, Record};

/// Error surfaced by a parser collaborator.
#[derive(Debug, Clone, Error, Serialize)]
#[error("Parse error: {message}")]
pub struct ParseError {
    /// What went wrong, as reported by the parser.
    pub message: String,
}

impl ParseError {
    /// Create a parse error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A parsed tabular dataset: headers plus typed row values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTable {
    /// Column names, in column order.
    pub headers: Vec<String>,
    /// Row values, in row order, each aligned with `headers`.
    pub rows: Vec<Vec<FieldValue>>,
}

impl ParsedTable {
    /// Convert rows into records, preserving row order.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        let headers = self.headers;
        self.rows
            .into_iter()
            .map(|row| Record::from_row(&headers, row))
            .collect()
    }
}

/// Parser collaborator: turns an opaque dataset locator into rows.
#[async_trait]
pub trait TableParser: Send + Sync {
    /// Parse the dataset behind `locator`.
    async fn parse(&self, locator: &str) -> Result<ParsedTable, ParseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_records_preserves_row_order() {
        let table = ParsedTable {
            headers: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![FieldValue::from(1i64), FieldValue::from("first")],
                vec![FieldValue::from(2i64), FieldValue::from("second")],
            ],
        };
        let records = table.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value_of("name"), &FieldValue::from("first"));
        assert_eq!(records[1].value_of("name"), &FieldValue::from("second"));
    }

    #[test]
    fn test_short_row_reads_as_null() {
        let table = ParsedTable {
            headers: vec!["id".to_string(), "name".to_string()],
            rows: vec![vec![FieldValue::from(1i64)]],
        };
        let records = table.into_records();
        assert!(records[0].value_of("name").is_null());
    }
}
