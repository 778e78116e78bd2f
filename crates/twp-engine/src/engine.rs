//! The policy engine facade.
//!
//! Owns one `WorkflowEntry` per admitted change request, keyed by request
//! id with per-key locking — distinct requests never contend on a shared
//! lock. Each request owns a cancellation token; per-operation tokens are
//! children of it, so cancelling a request halts every in-flight operation
//! and pending retry timer it spawned.

use crate::classifier::{classify, TriggerDecision};
use crate::confirmation::ConfirmationGate;
use crate::error::{CallError, EngineError};
use crate::observer::{PolicyObserver, TracingObserver};
use crate::plan_validator::{validate, ValidationResult};
use crate::resilience::{AttemptRecord, ResilienceWrapper};
use crate::state_machine::validate_transition;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use twp_types::{
    ChangeRequest, ConfirmationDecision, ConfirmationRecord, Operation, OperationId, PlanArtifact,
    PolicySet, RecordId, RequestId, WorkflowState,
};

/// Handle to an admitted workflow, for polling and cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkflowHandle {
    /// The admitted request's id
    pub request_id: RequestId,
}

/// Handle to a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationHandle {
    /// The owning workflow
    pub request_id: RequestId,
    /// The queued operation
    pub operation_id: OperationId,
}

/// Lifecycle status of a queued operation.
///
/// Operations are consumed once: `Executed`, `Failed`, `Rejected`, and
/// `Blocked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OperationStatus {
    /// Queued, not yet executed
    Queued,
    /// Execution in flight
    Executing,
    /// Executed successfully
    Executed,
    /// Execution failed
    Failed,
    /// Confirmation denied
    Rejected,
    /// Cancelled before completion
    Blocked,
}

impl OperationStatus {
    /// Whether the operation has a terminal outcome
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Queued | OperationStatus::Executing)
    }
}

#[derive(Debug)]
struct OperationEntry {
    op: Operation,
    status: OperationStatus,
    attempts: Vec<AttemptRecord>,
}

#[derive(Debug)]
struct WorkflowEntry {
    request: ChangeRequest,
    decision: TriggerDecision,
    state: WorkflowState,
    operations: BTreeMap<OperationId, OperationEntry>,
    cancel: CancellationToken,
}

impl WorkflowEntry {
    fn transition(
        &mut self,
        to: WorkflowState,
        observer: &dyn PolicyObserver,
    ) -> Result<(), EngineError> {
        validate_transition(self.state, to)?;
        let from = self.state;
        self.state = to;
        observer.on_transition(self.request.id, from, to);
        Ok(())
    }

    fn require_phase(&self, expected: WorkflowState) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::WrongPhase {
                id: self.request.id,
                expected,
                actual: self.state,
            })
        }
    }
}

/// The Task Workflow Policy engine.
pub struct PolicyEngine {
    workflows: DashMap<RequestId, Arc<Mutex<WorkflowEntry>>>,
    gate: ConfirmationGate,
    policies: PolicySet,
    wrapper: ResilienceWrapper,
    observer: Arc<dyn PolicyObserver>,
}

impl PolicyEngine {
    /// Create an engine with the default tracing observer
    #[must_use]
    pub fn new(policies: PolicySet) -> Self {
        Self::with_observer(policies, Arc::new(TracingObserver))
    }

    /// Create an engine with a custom observer
    #[must_use]
    pub fn with_observer(policies: PolicySet, observer: Arc<dyn PolicyObserver>) -> Self {
        Self {
            workflows: DashMap::new(),
            gate: ConfirmationGate::new(),
            policies,
            wrapper: ResilienceWrapper::new(),
            observer,
        }
    }

    /// Access the confirmation gate
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    /// Admit a change request.
    ///
    /// Classifies the request and routes it to Plan (trigger matched) or
    /// straight to Build (small/isolated change).
    ///
    /// # Errors
    /// Returns `InvalidRequest` for malformed requests, rejected before
    /// admission.
    pub fn submit(&self, request: ChangeRequest) -> Result<WorkflowHandle, EngineError> {
        let decision = classify(&request)?;
        self.observer.on_admission(&request, &decision);

        let id = request.id;
        let mut entry = WorkflowEntry {
            request,
            decision: decision.clone(),
            state: WorkflowState::Idle,
            operations: BTreeMap::new(),
            cancel: CancellationToken::new(),
        };

        let first = if decision.required {
            WorkflowState::Plan
        } else {
            WorkflowState::Build
        };
        entry.transition(first, self.observer.as_ref())?;

        self.workflows.insert(id, Arc::new(Mutex::new(entry)));
        Ok(WorkflowHandle { request_id: id })
    }

    /// Current workflow state
    ///
    /// # Errors
    /// Returns `UnknownWorkflow` for an unadmitted handle.
    pub async fn get_state(&self, handle: &WorkflowHandle) -> Result<WorkflowState, EngineError> {
        Ok(self.entry(handle.request_id)?.lock().await.state)
    }

    /// The trigger decision recorded at admission
    ///
    /// # Errors
    /// Returns `UnknownWorkflow` for an unadmitted handle.
    pub async fn trigger_decision(
        &self,
        handle: &WorkflowHandle,
    ) -> Result<TriggerDecision, EngineError> {
        Ok(self.entry(handle.request_id)?.lock().await.decision.clone())
    }

    /// Submit a plan artifact for a workflow holding in Plan.
    ///
    /// A valid plan moves the workflow to Build; an invalid one leaves it
    /// in Plan and reports the missing sections.
    ///
    /// # Errors
    /// Returns `WrongPhase` if the workflow is not in Plan.
    pub async fn submit_plan(
        &self,
        handle: &WorkflowHandle,
        plan: PlanArtifact,
    ) -> Result<ValidationResult, EngineError> {
        let entry = self.entry(handle.request_id)?;
        let mut entry = entry.lock().await;
        entry.require_phase(WorkflowState::Plan)?;

        let result = validate(&plan);
        if result.valid {
            entry.transition(WorkflowState::Build, self.observer.as_ref())?;
        } else {
            tracing::debug!(
                request = %handle.request_id,
                missing = ?result.missing,
                "plan incomplete, holding in Plan"
            );
        }
        Ok(result)
    }

    /// Queue an operation for execution during Build.
    ///
    /// A dangerous operation gets a pending confirmation record at queue
    /// time; it will not execute until that record is approved.
    ///
    /// # Errors
    /// Returns `WrongPhase` outside Build, or a confirmation error if the
    /// operation id was already confirmed and resolved.
    pub async fn queue_operation(
        &self,
        handle: &WorkflowHandle,
        op: Operation,
    ) -> Result<OperationHandle, EngineError> {
        let entry = self.entry(handle.request_id)?;
        let mut entry = entry.lock().await;
        entry.require_phase(WorkflowState::Build)?;

        if op.is_dangerous() {
            let record = self.gate.request_confirmation(&op)?;
            self.observer.on_confirmation(&record);
        }

        let operation_id = op.id;
        entry.operations.insert(
            operation_id,
            OperationEntry {
                op,
                status: OperationStatus::Queued,
                attempts: Vec::new(),
            },
        );

        Ok(OperationHandle {
            request_id: handle.request_id,
            operation_id,
        })
    }

    /// Resolve a confirmation record, exactly once.
    ///
    /// # Errors
    /// See [`ConfirmationGate::resolve`].
    pub fn resolve_confirmation(
        &self,
        record_id: RecordId,
        decision: ConfirmationDecision,
    ) -> Result<ConfirmationRecord, EngineError> {
        let record = self.gate.resolve(record_id, decision)?;
        self.observer.on_confirmation(&record);
        Ok(record)
    }

    /// The confirmation record attached to an operation, if any
    #[must_use]
    pub fn confirmation_record(&self, handle: &OperationHandle) -> Option<ConfirmationRecord> {
        self.gate.record_for(handle.operation_id)
    }

    /// Suspend until the operation's confirmation is resolved.
    ///
    /// Fail-closed: waits indefinitely unless the workflow is cancelled.
    ///
    /// # Errors
    /// Returns `Cancelled` if the workflow is cancelled while waiting,
    /// `UnknownOperation` if no confirmation record exists.
    pub async fn wait_for_confirmation(
        &self,
        handle: &OperationHandle,
    ) -> Result<ConfirmationDecision, EngineError> {
        let cancel = {
            let entry = self.entry(handle.request_id)?;
            let entry = entry.lock().await;
            entry.cancel.clone()
        };
        let record = self
            .gate
            .record_for(handle.operation_id)
            .ok_or(EngineError::UnknownOperation(handle.operation_id))?;

        tokio::select! {
            () = cancel.cancelled() => Err(EngineError::Cancelled(handle.operation_id)),
            decision = self.gate.await_decision(record.id) => decision,
        }
    }

    /// Execute a queued operation through the resilience wrapper.
    ///
    /// Dangerous operations fail fast with `ConfirmationPending` /
    /// `ConfirmationDenied` unless approved — the side effect is never
    /// applied without an approved record. The action receives the 1-based
    /// attempt number; it is re-invoked only for idempotent operations on
    /// transient failures, within the per-kind policy budget.
    ///
    /// # Errors
    /// Confirmation errors, `Timeout`, `Cancelled`, `RetriesExhausted`,
    /// `NonIdempotentFailure`, or `CallFailed`, per the resilience
    /// contract.
    pub async fn execute_operation<T, F, Fut>(
        &self,
        handle: &OperationHandle,
        action: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let entry_arc = self.entry(handle.request_id)?;

        let (op, policy, cancel) = {
            let mut entry = entry_arc.lock().await;
            entry.require_phase(WorkflowState::Build)?;

            let op_entry = entry
                .operations
                .get_mut(&handle.operation_id)
                .ok_or(EngineError::UnknownOperation(handle.operation_id))?;

            match op_entry.status {
                OperationStatus::Queued => {}
                OperationStatus::Rejected => {
                    return Err(EngineError::ConfirmationDenied(handle.operation_id));
                }
                _ => return Err(EngineError::OperationConsumed(handle.operation_id)),
            }

            let op = op_entry.op.clone();
            if op.is_dangerous() {
                match self.gate.record_for(op.id).map(|r| r.decision) {
                    Some(ConfirmationDecision::Approved) => {}
                    Some(ConfirmationDecision::Denied) => {
                        op_entry.status = OperationStatus::Rejected;
                        return Err(EngineError::ConfirmationDenied(op.id));
                    }
                    Some(ConfirmationDecision::Pending) | None => {
                        return Err(EngineError::ConfirmationPending(op.id));
                    }
                }
            }

            op_entry.status = OperationStatus::Executing;
            let policy = self.policies.policy_for(op.kind);
            let cancel = entry.cancel.child_token();
            (op, policy, cancel)
        };

        // Lock released while the call runs; other workflows and other
        // operations of this workflow progress freely.
        let outcome = self.wrapper.execute(&op, &policy, &cancel, action).await;

        let mut entry = entry_arc.lock().await;
        if let Some(op_entry) = entry.operations.get_mut(&handle.operation_id) {
            for record in &outcome.attempts {
                self.observer.on_attempt(op.id, record);
            }
            op_entry.status = match &outcome.result {
                Ok(_) => OperationStatus::Executed,
                Err(EngineError::Cancelled(_)) => OperationStatus::Blocked,
                Err(_) => OperationStatus::Failed,
            };
            op_entry.attempts = outcome.attempts;
        }

        outcome.result
    }

    /// Move a Build workflow to Verify.
    ///
    /// # Errors
    /// Returns `OperationsPending` while any operation lacks a terminal
    /// outcome — a Build with an operation still awaiting confirmation
    /// cannot progress.
    pub async fn begin_verify(&self, handle: &WorkflowHandle) -> Result<(), EngineError> {
        let entry = self.entry(handle.request_id)?;
        let mut entry = entry.lock().await;
        entry.require_phase(WorkflowState::Build)?;

        if entry.operations.values().any(|e| !e.status.is_terminal()) {
            return Err(EngineError::OperationsPending(handle.request_id));
        }
        entry.transition(WorkflowState::Verify, self.observer.as_ref())
    }

    /// Complete verification: Done when clean, Blocked on a violation.
    ///
    /// Scans the operation records for policy violations: a dangerous
    /// operation executed without an approved record, or retries recorded
    /// for an operation without an idempotency key.
    ///
    /// # Errors
    /// Returns `PolicyViolation` (fatal) after moving the workflow to
    /// Blocked.
    pub async fn complete(&self, handle: &WorkflowHandle) -> Result<(), EngineError> {
        let entry = self.entry(handle.request_id)?;
        let mut entry = entry.lock().await;
        entry.require_phase(WorkflowState::Verify)?;

        let mut violations = Vec::new();
        for (id, op_entry) in &entry.operations {
            if op_entry.attempts.len() > 1 && !op_entry.op.is_idempotent() {
                violations.push(format!("operation {id} retried without idempotency key"));
            }
            if op_entry.status == OperationStatus::Executed && op_entry.op.is_dangerous() {
                let approved = self
                    .gate
                    .record_for(*id)
                    .is_some_and(|r| r.is_approved());
                if !approved {
                    violations.push(format!("dangerous operation {id} executed without approval"));
                }
            }
        }

        if violations.is_empty() {
            entry.transition(WorkflowState::Done, self.observer.as_ref())
        } else {
            let reason = violations.join("; ");
            tracing::error!(request = %handle.request_id, %reason, "policy violation");
            entry.cancel.cancel();
            entry.transition(WorkflowState::Blocked, self.observer.as_ref())?;
            Err(EngineError::PolicyViolation(reason))
        }
    }

    /// Reopen Build from Verify — the only backward transition, for
    /// correctable gaps found during verification.
    ///
    /// # Errors
    /// Returns `IllegalTransition` from any state but Verify.
    pub async fn reopen_build(&self, handle: &WorkflowHandle) -> Result<(), EngineError> {
        let entry = self.entry(handle.request_id)?;
        let mut entry = entry.lock().await;
        entry.transition(WorkflowState::Build, self.observer.as_ref())
    }

    /// Block a workflow on a caller-detected policy violation.
    ///
    /// # Errors
    /// Returns `IllegalTransition` for already-terminal workflows.
    pub async fn block(&self, handle: &WorkflowHandle, reason: &str) -> Result<(), EngineError> {
        let entry = self.entry(handle.request_id)?;
        let mut entry = entry.lock().await;
        tracing::error!(request = %handle.request_id, %reason, "workflow blocked");
        entry.cancel.cancel();
        entry.transition(WorkflowState::Blocked, self.observer.as_ref())
    }

    /// Cancel a workflow, propagating to every descendant operation.
    ///
    /// In-flight calls and pending retry timers are halted via the child
    /// tokens; non-terminal operations are marked Blocked and the workflow
    /// ends in Blocked.
    ///
    /// # Errors
    /// Returns `UnknownWorkflow` for an unadmitted handle.
    pub async fn cancel(&self, handle: &WorkflowHandle) -> Result<(), EngineError> {
        let entry = self.entry(handle.request_id)?;
        let mut entry = entry.lock().await;
        entry.cancel.cancel();

        for op_entry in entry.operations.values_mut() {
            if !op_entry.status.is_terminal() {
                op_entry.status = OperationStatus::Blocked;
            }
        }
        if !entry.state.is_terminal() {
            entry.transition(WorkflowState::Blocked, self.observer.as_ref())?;
        }
        Ok(())
    }

    /// Status of a queued operation
    ///
    /// # Errors
    /// Returns `UnknownWorkflow`/`UnknownOperation` for unknown handles.
    pub async fn operation_status(
        &self,
        handle: &OperationHandle,
    ) -> Result<OperationStatus, EngineError> {
        let entry = self.entry(handle.request_id)?;
        let entry = entry.lock().await;
        entry
            .operations
            .get(&handle.operation_id)
            .map(|e| e.status)
            .ok_or(EngineError::UnknownOperation(handle.operation_id))
    }

    /// Attempt log recorded for an operation
    ///
    /// # Errors
    /// Returns `UnknownWorkflow`/`UnknownOperation` for unknown handles.
    pub async fn operation_attempts(
        &self,
        handle: &OperationHandle,
    ) -> Result<Vec<AttemptRecord>, EngineError> {
        let entry = self.entry(handle.request_id)?;
        let entry = entry.lock().await;
        entry
            .operations
            .get(&handle.operation_id)
            .map(|e| e.attempts.clone())
            .ok_or(EngineError::UnknownOperation(handle.operation_id))
    }

    fn entry(&self, id: RequestId) -> Result<Arc<Mutex<WorkflowEntry>>, EngineError> {
        self.workflows
            .get(&id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(EngineError::UnknownWorkflow(id))
    }
}
