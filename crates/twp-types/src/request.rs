//! Change requests: the unit of work submitted to the engine.

use crate::ids::RequestId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Attribute flags describing the nature of a change request.
///
/// Set by the caller at construction; the classifier reads them to decide
/// whether a formal planning phase is mandatory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFlags {
    /// Change spans multiple files or layers
    pub multi_file: bool,
    /// Change touches a DB schema or API contract
    pub schema_change: bool,
    /// Change touches auth or security middleware
    pub auth_related: bool,
    /// Change is a complex refactor
    pub complex_refactor: bool,
    /// Change is a bugfix beyond a trivial patch
    pub nontrivial_bugfix: bool,
}

/// A unit of work submitted to the policy engine.
///
/// Immutable once created. The engine never mutates a request; it derives a
/// `TriggerDecision` from it and tracks lifecycle state separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Request identifier
    pub id: RequestId,
    /// Free-text description of the change
    pub description: String,
    /// Tags of the modules the change touches
    pub affected_modules: BTreeSet<String>,
    /// Attribute flags
    pub flags: RequestFlags,
}

impl ChangeRequest {
    /// Create a new request with a fresh identifier
    #[inline]
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            description: description.into(),
            affected_modules: BTreeSet::new(),
            flags: RequestFlags::default(),
        }
    }

    /// With an affected-module tag
    #[inline]
    #[must_use]
    pub fn with_module(mut self, tag: impl Into<String>) -> Self {
        self.affected_modules.insert(tag.into());
        self
    }

    /// With attribute flags
    #[inline]
    #[must_use]
    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Number of distinct modules the change touches
    #[inline]
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.affected_modules.len()
    }

    /// Check the request is well-formed enough to admit.
    ///
    /// Returns the list of missing fields; empty means admissible.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        missing
    }
}
