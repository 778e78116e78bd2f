//! Workflow state machine transition table.
//!
//! States never regress except explicitly to Blocked; the only backward
//! edge is Verify → Build, for correctable gaps found during verification.

use crate::error::EngineError;
use twp_types::WorkflowState;

/// Validates a state transition against the workflow graph.
///
/// # Errors
/// Returns `IllegalTransition` when the edge is not in the graph.
pub fn validate_transition(from: WorkflowState, to: WorkflowState) -> Result<(), EngineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(EngineError::IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step.
pub fn allowed_transitions(from: WorkflowState) -> Vec<WorkflowState> {
    use WorkflowState::*;
    match from {
        Idle => vec![Plan, Build, Blocked],
        Plan => vec![Build, Blocked],
        Build => vec![Verify, Blocked],
        Verify => vec![Done, Build, Blocked],
        Done => vec![],
        Blocked => vec![],
    }
}

fn allowed(from: WorkflowState, to: WorkflowState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
