//! Confirmation records for dangerous operations.

use crate::ids::{OperationId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decision state of a confirmation record.
///
/// Default is fail-closed: a dangerous operation with a `Pending` (or
/// absent) record never executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationDecision {
    /// Awaiting caller decision
    Pending,
    /// Approved for execution
    Approved,
    /// Permanently denied
    Denied,
}

impl ConfirmationDecision {
    /// Whether a decision has been made
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ConfirmationDecision::Pending)
    }
}

impl std::fmt::Display for ConfirmationDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfirmationDecision::Pending => "pending",
            ConfirmationDecision::Approved => "approved",
            ConfirmationDecision::Denied => "denied",
        };
        write!(f, "{s}")
    }
}

/// Approval state of one dangerous operation.
///
/// Created when the operation is queued for confirmation; resolved exactly
/// once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    /// Record identifier, handed to the caller for resolution
    pub id: RecordId,
    /// The operation awaiting approval
    pub operation_id: OperationId,
    /// Current decision
    pub decision: ConfirmationDecision,
    /// When the confirmation was requested
    pub requested_at: DateTime<Utc>,
    /// When the decision was made, if it has been
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ConfirmationRecord {
    /// Create a pending record for an operation
    #[inline]
    #[must_use]
    pub fn pending(operation_id: OperationId) -> Self {
        Self {
            id: RecordId::new(),
            operation_id,
            decision: ConfirmationDecision::Pending,
            requested_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Whether the record authorizes execution
    #[inline]
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self.decision, ConfirmationDecision::Approved)
    }
}
