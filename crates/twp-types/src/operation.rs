//! Operations: single actions attempted during Build/Verify.

use crate::ids::OperationId;
use serde::{Deserialize, Serialize};

/// Kind of real-world effect an operation performs.
///
/// Resilience policies are configured per kind, not per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// File create/modify/delete
    Filesystem,
    /// Version-control operations
    Vcs,
    /// Database reads/writes/migrations
    Database,
    /// Dependency installation or upgrades
    Dependency,
    /// Network or system-level calls
    Network,
    /// Anything else
    Generic,
}

impl OperationKind {
    /// All kinds, in declaration order
    pub const ALL: [OperationKind; 6] = [
        OperationKind::Filesystem,
        OperationKind::Vcs,
        OperationKind::Database,
        OperationKind::Dependency,
        OperationKind::Network,
        OperationKind::Generic,
    ];
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Filesystem => "filesystem",
            OperationKind::Vcs => "vcs",
            OperationKind::Database => "database",
            OperationKind::Dependency => "dependency",
            OperationKind::Network => "network",
            OperationKind::Generic => "generic",
        };
        write!(f, "{s}")
    }
}

/// The fixed set of dangerous-operation categories.
///
/// This is a closed enumeration: extending it means adding a variant here,
/// not matching strings at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DangerCategory {
    /// Destructive filesystem operations (recursive delete, overwrite)
    DestructiveFilesystem,
    /// Version-control history mutation (force push, reset, rebase)
    VcsHistoryMutation,
    /// Destructive or bulk database operations
    DestructiveDatabase,
    /// Operations that rewrite a dependency lockfile
    DependencyLockfile,
    /// System, security, or network-sensitive operations
    SystemSensitive,
}

impl DangerCategory {
    /// The operation kind this category applies to
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            DangerCategory::DestructiveFilesystem => OperationKind::Filesystem,
            DangerCategory::VcsHistoryMutation => OperationKind::Vcs,
            DangerCategory::DestructiveDatabase => OperationKind::Database,
            DangerCategory::DependencyLockfile => OperationKind::Dependency,
            DangerCategory::SystemSensitive => OperationKind::Network,
        }
    }
}

impl std::fmt::Display for DangerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DangerCategory::DestructiveFilesystem => "destructive_filesystem",
            DangerCategory::VcsHistoryMutation => "vcs_history_mutation",
            DangerCategory::DestructiveDatabase => "destructive_database",
            DangerCategory::DependencyLockfile => "dependency_lockfile",
            DangerCategory::SystemSensitive => "system_sensitive",
        };
        write!(f, "{s}")
    }
}

/// A single action attempted during Build or Verify.
///
/// Consumed once: executed, rejected, or blocked. Never reused across
/// distinct real-world effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation identifier
    pub id: OperationId,
    /// Kind of effect
    pub kind: OperationKind,
    /// Danger category, if the operation is dangerous
    pub danger: Option<DangerCategory>,
    /// Whether the effect can be undone
    pub reversible: bool,
    /// Idempotency key; presence is the proof of retry safety
    pub idempotency_key: Option<String>,
}

impl Operation {
    /// Create a non-dangerous operation
    #[inline]
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            danger: None,
            reversible: true,
            idempotency_key: None,
        }
    }

    /// Create a dangerous operation in the given category.
    ///
    /// The kind is derived from the category so the two cannot disagree.
    #[inline]
    #[must_use]
    pub fn dangerous(category: DangerCategory) -> Self {
        Self {
            id: OperationId::new(),
            kind: category.kind(),
            danger: Some(category),
            reversible: false,
            idempotency_key: None,
        }
    }

    /// Mark the operation reversible
    #[inline]
    #[must_use]
    pub fn with_reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    /// With an idempotency key, declaring the operation safe to retry
    #[inline]
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Whether the operation requires explicit approval before execution
    #[inline]
    #[must_use]
    pub fn is_dangerous(&self) -> bool {
        self.danger.is_some()
    }

    /// Whether the operation may be retried on transient failure
    #[inline]
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        self.idempotency_key.is_some()
    }
}
