//! Error Types
//!
//! This module provides the standardized cross-crate error type for
//! crosscheck.
//!
//! # Example
//!
//! ```
//! use crosscheck_core::{CoreError, Result};
//!
//! fn find_stream(id: &str) -> Result<String> {
//!     if id.is_empty() {
//!         return Err(CoreError::NotFound {
//!             resource: "Stream".to_string(),
//!             id: None,
//!         });
//!     }
//!     Ok(format!("Stream {}", id))
//! }
//! ```

use crate::ids::OrgId;
use serde::Serialize;
use thiserror::Error;

/// Standardized error type for crosscheck.
///
/// These variants cover the failure modes shared across crates: unknown
/// entities, cross-organization access, and input validation. Engine-level
/// concerns (rule sets, parsing, state transitions) carry their own error
/// enums in `crosscheck-engine`.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreError {
    /// Requested resource was not found.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource that was not found (e.g., "Run", "Stream")
        resource: String,
        /// Optional identifier of the resource
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Organization isolation violation.
    ///
    /// Raised when an operation attempts to use an entity that belongs to a
    /// different organization.
    #[error("Access denied: entity belongs to org {owner}, caller is org {caller}")]
    AccessDenied {
        /// The organization that owns the entity
        owner: OrgId,
        /// The organization that attempted the access
        caller: OrgId,
    },

    /// Input validation failure.
    #[error("Validation error on field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },
}

/// Type alias for Results using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
