//! Organization Scoping Traits
//!
//! This module provides traits for org-owned entities in crosscheck.

use crate::ids::OrgId;

/// Trait for entities that belong to a specific organization.
///
/// Implementing this trait marks an entity as org-scoped, enabling generic
/// access checks at the boundary where a caller's organization must match
/// the owner of a stream or run.
///
/// # Example
///
/// ```
/// use crosscheck_core::{OrgId, OrgScoped};
///
/// struct Stream {
///     org_id: OrgId,
///     name: String,
/// }
///
/// impl OrgScoped for Stream {
///     fn org_id(&self) -> OrgId {
///         self.org_id
///     }
/// }
///
/// fn owned_by<T: OrgScoped>(entity: &T, org: OrgId) -> bool {
///     entity.org_id() == org
/// }
/// ```
pub trait OrgScoped {
    /// Returns the organization that owns this entity.
    fn org_id(&self) -> OrgId;
}
