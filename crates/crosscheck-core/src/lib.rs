//! crosscheck Core Library
//!
//! Shared types and traits for crosscheck.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (OrgId, StreamId, RunId, ...)
//! - [`traits`] - Organization scoping traits (OrgScoped)
//! - [`error`] - Standardized error types (CoreError)
//!
//! # Example
//!
//! ```
//! use crosscheck_core::{OrgId, RunId, OrgScoped, CoreError, Result};
//!
//! // Create strongly typed IDs
//! let org_id = OrgId::new();
//! let run_id = RunId::new();
//!
//! // Use Result type alias
//! fn example() -> Result<()> {
//!     Err(CoreError::NotFound {
//!         resource: "Run".to_string(),
//!         id: None,
//!     })
//! }
//! ```

pub mod error;
pub mod ids;
pub mod traits;

// Re-export main types for convenient access
pub use error::{CoreError, Result};
pub use ids::{ExceptionId, OrgId, RuleSetId, RunId, StepId, StepRunId, StreamId};
pub use traits::OrgScoped;
