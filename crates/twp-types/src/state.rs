//! Workflow lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one change request.
///
/// Exactly one instance per request, mutated only by the workflow state
/// machine. `Done` and `Blocked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    /// Admitted, not yet routed
    Idle,
    /// Holding for a validated plan artifact
    Plan,
    /// Executing operations
    Build,
    /// Checking for policy violations
    Verify,
    /// Completed cleanly (terminal)
    Done,
    /// Halted on a policy violation or unrecoverable failure (terminal)
    Blocked,
}

impl WorkflowState {
    /// Whether the workflow can make no further progress
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Blocked)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
