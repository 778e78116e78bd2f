//! Error taxonomy for the policy engine.
//!
//! Local recovery is limited to retrying idempotent transient failures
//! within budget; everything else propagates to the caller with the
//! operation id and cause attached.

use std::collections::BTreeSet;
use std::time::Duration;
use twp_types::{OperationId, RecordId, RequestId, WorkflowState};

/// Classification of an outbound-call failure for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureClass {
    /// Network/timeout class; safe to retry an idempotent call
    Transient,
    /// Validation/logic class; retrying cannot succeed
    Permanent,
}

/// Failure reported by an outbound call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CallError {
    /// Failure class
    pub class: FailureClass,
    /// Human-readable cause
    pub message: String,
}

impl CallError {
    /// Transient (retryable) failure
    #[inline]
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            message: message.into(),
        }
    }

    /// Permanent (non-retryable) failure
    #[inline]
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Permanent,
            message: message.into(),
        }
    }

    /// Whether the failure is in the transient class
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.class, FailureClass::Transient)
    }
}

/// Main engine error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Change request rejected before admission
    #[error("invalid request: missing {missing:?}")]
    InvalidRequest {
        /// Fields the request lacks
        missing: Vec<&'static str>,
    },

    /// No workflow admitted under this id
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(RequestId),

    /// No operation queued under this id
    #[error("unknown operation: {0}")]
    UnknownOperation(OperationId),

    /// Operation already consumed by a terminal outcome
    #[error("operation already consumed: {0}")]
    OperationConsumed(OperationId),

    /// No confirmation record under this id
    #[error("unknown confirmation record: {0}")]
    UnknownRecord(RecordId),

    /// Plan missing required sections; workflow stays in Plan
    #[error("plan incomplete: missing {missing:?}")]
    ValidationIncomplete {
        /// Names of the missing sections
        missing: BTreeSet<String>,
    },

    /// Dangerous operation blocked awaiting a decision
    #[error("confirmation pending for operation {0}")]
    ConfirmationPending(OperationId),

    /// Dangerous operation permanently denied
    #[error("confirmation denied for operation {0}")]
    ConfirmationDenied(OperationId),

    /// Confirmation already resolved; records resolve exactly once
    #[error("confirmation already resolved: {0}")]
    DuplicateConfirmation(RecordId),

    /// A confirmation cannot be resolved back to pending
    #[error("cannot resolve a confirmation to pending: {0}")]
    InvalidDecision(RecordId),

    /// Operations still lack terminal outcomes; Build cannot progress
    #[error("operations still pending for workflow {0}")]
    OperationsPending(RequestId),

    /// Call arrived in the wrong workflow phase
    #[error("workflow {id} is in {actual}, expected {expected}")]
    WrongPhase {
        /// The workflow
        id: RequestId,
        /// Phase the call requires
        expected: WorkflowState,
        /// Phase the workflow is in
        actual: WorkflowState,
    },

    /// Single call exceeded its hard timeout
    #[error("operation {op} timed out after {timeout:?} on attempt {attempt}")]
    Timeout {
        /// The operation that timed out
        op: OperationId,
        /// Attempt number (1-based)
        attempt: u32,
        /// The configured hard timeout
        timeout: Duration,
    },

    /// Cancellation signalled; in-flight call abandoned
    #[error("operation {0} cancelled")]
    Cancelled(OperationId),

    /// Transient failure persisted past the retry budget
    #[error("operation {op}: retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// The operation that failed
        op: OperationId,
        /// Total attempts made
        attempts: u32,
        /// The final cause
        last: CallError,
    },

    /// Non-idempotent operation failed; never retried automatically
    #[error("non-idempotent operation {op} failed: {cause}")]
    NonIdempotentFailure {
        /// The operation that failed
        op: OperationId,
        /// The single-attempt cause
        cause: CallError,
    },

    /// Idempotent operation failed in the permanent class
    #[error("operation {op} failed: {cause}")]
    CallFailed {
        /// The operation that failed
        op: OperationId,
        /// The cause
        cause: CallError,
    },

    /// Transition not in the workflow state graph
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: WorkflowState,
        /// Requested state
        to: WorkflowState,
    },

    /// Fatal: workflow moves to Blocked, requires human intervention
    #[error("policy violation: {0}")]
    PolicyViolation(String),
}

impl EngineError {
    /// Whether the caller can recover without human intervention
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    /// Whether the error marks a defect requiring human intervention
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::PolicyViolation(_) | EngineError::IllegalTransition { .. }
        )
    }

    /// Whether the error came from the resilience wrapper's attempt loop
    #[must_use]
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout { .. }
                | EngineError::Cancelled(_)
                | EngineError::RetriesExhausted { .. }
                | EngineError::NonIdempotentFailure { .. }
                | EngineError::CallFailed { .. }
        )
    }
}
