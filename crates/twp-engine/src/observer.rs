//! Observability sink for decisions and attempts.
//!
//! Fire-and-forget: observer methods return nothing and must never affect
//! workflow correctness. The default observer emits `tracing` events.

use crate::classifier::TriggerDecision;
use crate::resilience::AttemptRecord;
use parking_lot::Mutex;
use twp_types::{ChangeRequest, ConfirmationRecord, OperationId, RequestId, WorkflowState};

/// Receives structured decision/attempt records.
pub trait PolicyObserver: Send + Sync {
    /// A change request was admitted
    fn on_admission(&self, _request: &ChangeRequest, _decision: &TriggerDecision) {}

    /// A workflow changed state
    fn on_transition(&self, _id: RequestId, _from: WorkflowState, _to: WorkflowState) {}

    /// A confirmation record was created or resolved
    fn on_confirmation(&self, _record: &ConfirmationRecord) {}

    /// An execution attempt finished
    fn on_attempt(&self, _operation: OperationId, _record: &AttemptRecord) {}
}

/// Default observer: structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PolicyObserver for TracingObserver {
    fn on_admission(&self, request: &ChangeRequest, decision: &TriggerDecision) {
        tracing::info!(
            request = %request.id,
            required = decision.required,
            rules = decision.matched.len(),
            "change request admitted"
        );
    }

    fn on_transition(&self, id: RequestId, from: WorkflowState, to: WorkflowState) {
        tracing::info!(request = %id, %from, %to, "workflow transition");
    }

    fn on_confirmation(&self, record: &ConfirmationRecord) {
        tracing::info!(
            record = %record.id,
            operation = %record.operation_id,
            decision = %record.decision,
            "confirmation record"
        );
    }

    fn on_attempt(&self, operation: OperationId, record: &AttemptRecord) {
        tracing::debug!(
            %operation,
            attempt = record.attempt,
            outcome = ?record.outcome,
            "execution attempt"
        );
    }
}

/// In-memory observer for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    transitions: Mutex<Vec<(RequestId, WorkflowState, WorkflowState)>>,
    attempts: Mutex<Vec<(OperationId, AttemptRecord)>>,
}

impl MemoryObserver {
    /// Create an empty observer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions seen so far
    #[must_use]
    pub fn transitions(&self) -> Vec<(RequestId, WorkflowState, WorkflowState)> {
        self.transitions.lock().clone()
    }

    /// Attempts seen so far
    #[must_use]
    pub fn attempts(&self) -> Vec<(OperationId, AttemptRecord)> {
        self.attempts.lock().clone()
    }
}

impl PolicyObserver for MemoryObserver {
    fn on_transition(&self, id: RequestId, from: WorkflowState, to: WorkflowState) {
        self.transitions.lock().push((id, from, to));
    }

    fn on_attempt(&self, operation: OperationId, record: &AttemptRecord) {
        self.attempts.lock().push((operation, record.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::AttemptOutcome;
    use std::time::Duration;

    #[test]
    fn memory_observer_records_transitions() {
        let obs = MemoryObserver::new();
        let id = RequestId::new();
        obs.on_transition(id, WorkflowState::Idle, WorkflowState::Plan);

        let seen = obs.transitions();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (id, WorkflowState::Idle, WorkflowState::Plan));
    }

    #[test]
    fn memory_observer_records_attempts() {
        let obs = MemoryObserver::new();
        let op = OperationId::new();
        obs.on_attempt(
            op,
            &AttemptRecord {
                attempt: 1,
                delay: Duration::ZERO,
                outcome: AttemptOutcome::Success,
            },
        );
        assert_eq!(obs.attempts().len(), 1);
    }
}
