//! Strongly Typed Identifiers
//!
//! This module provides type-safe identifier types for crosscheck.
//! Using the newtype pattern, these types prevent accidental misuse of
//! different ID types at compile time.
//!
//! # Example
//!
//! ```
//! use crosscheck_core::{OrgId, RunId};
//!
//! let org = OrgId::new();
//! let run = RunId::new();
//!
//! // Type safety: cannot pass RunId where OrgId is expected
//! fn requires_org(id: OrgId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_org(org);
//! // requires_org(run); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Strongly typed identifier for organizations.
    ///
    /// Organizations are the tenancy unit of crosscheck: every stream and
    /// every reconciliation run belongs to exactly one organization.
    ///
    /// # Example
    ///
    /// ```
    /// use crosscheck_core::OrgId;
    ///
    /// let org_id = OrgId::new();
    /// println!("Org: {}", org_id);
    /// ```
    OrgId
);

define_id!(
    /// Strongly typed identifier for reconciliation streams.
    ///
    /// A stream is an ordered pipeline of reconciliation steps that runs
    /// are created against.
    StreamId
);

define_id!(
    /// Strongly typed identifier for step definitions within a stream.
    StepId
);

define_id!(
    /// Strongly typed identifier for reconciliation runs.
    ///
    /// # Example
    ///
    /// ```
    /// use crosscheck_core::RunId;
    ///
    /// let run_id: RunId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
    /// assert_eq!(run_id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    /// ```
    RunId
);

define_id!(
    /// Strongly typed identifier for step executions within a run.
    StepRunId
);

define_id!(
    /// Strongly typed identifier for reconciliation rule sets.
    RuleSetId
);

define_id!(
    /// Strongly typed identifier for reconciliation exceptions.
    ExceptionId
);
