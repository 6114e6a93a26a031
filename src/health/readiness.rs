//! Per-route readiness gate.
//!
//! # Responsibilities
//! - Decide admit/reject from the live handles and the route's declared
//!   backend requirements, before any authentication or handler runs
//!
//! # Design Decisions
//! - Pure function of its inputs; no side effects, no caching
//! - Requirements are declared per route, never inferred from the path
//! - First unready kind in declaration order is the reported reason

use crate::backend::{BackendKind, BackendSet};

/// Read-only view of backend readiness.
pub trait Readiness: Send + Sync {
    /// True iff `kind` currently has a live client.
    fn is_ready(&self, kind: BackendKind) -> bool;
}

/// Outcome of the readiness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// The first required backend found unready.
    Rejected(BackendKind),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Check every backend in `required` against `readiness`.
pub fn admit(required: BackendSet, readiness: &dyn Readiness) -> Admission {
    required
        .iter()
        .find(|kind| !readiness.is_ready(*kind))
        .map_or(Admission::Allowed, Admission::Rejected)
}
