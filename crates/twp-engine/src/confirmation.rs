//! Fail-closed confirmation gate for dangerous operations.
//!
//! Default state is closed: a dangerous operation with no record, a pending
//! record, or a denied record never executes. There is no timeout-based
//! auto-approval — waiting for a decision is an async suspension on a watch
//! channel, resolved only by an explicit caller decision.

use crate::error::EngineError;
use dashmap::DashMap;
use tokio::sync::watch;
use twp_types::{ConfirmationDecision, ConfirmationRecord, Operation, OperationId, RecordId};

#[derive(Debug)]
struct Slot {
    record: ConfirmationRecord,
    tx: watch::Sender<ConfirmationDecision>,
}

/// Per-record confirmation state, keyed maps only — no global lock.
#[derive(Debug, Default)]
pub struct ConfirmationGate {
    records: DashMap<RecordId, Slot>,
    by_operation: DashMap<OperationId, RecordId>,
}

impl ConfirmationGate {
    /// Create an empty gate
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending confirmation record for an operation.
    ///
    /// Re-requesting while a record is still pending returns the existing
    /// record; re-requesting after resolution is an error, because each
    /// operation id maps to exactly one real-world effect.
    ///
    /// # Errors
    /// Returns `DuplicateConfirmation` if the operation already has a
    /// resolved record.
    pub fn request_confirmation(
        &self,
        op: &Operation,
    ) -> Result<ConfirmationRecord, EngineError> {
        if let Some(existing) = self.by_operation.get(&op.id) {
            let record_id = *existing;
            drop(existing);
            let slot = self
                .records
                .get(&record_id)
                .ok_or(EngineError::UnknownRecord(record_id))?;
            if slot.record.decision.is_resolved() {
                return Err(EngineError::DuplicateConfirmation(record_id));
            }
            return Ok(slot.record.clone());
        }

        let record = ConfirmationRecord::pending(op.id);
        let (tx, _rx) = watch::channel(ConfirmationDecision::Pending);

        tracing::info!(
            operation = %op.id,
            record = %record.id,
            kind = %op.kind,
            "confirmation requested"
        );

        self.by_operation.insert(op.id, record.id);
        self.records.insert(
            record.id,
            Slot {
                record: record.clone(),
                tx,
            },
        );

        Ok(record)
    }

    /// Resolve a pending record, exactly once.
    ///
    /// # Errors
    /// - `UnknownRecord` if no record exists under the id
    /// - `InvalidDecision` if the decision is `Pending`
    /// - `DuplicateConfirmation` if the record was already resolved
    pub fn resolve(
        &self,
        record_id: RecordId,
        decision: ConfirmationDecision,
    ) -> Result<ConfirmationRecord, EngineError> {
        if !decision.is_resolved() {
            return Err(EngineError::InvalidDecision(record_id));
        }

        let mut slot = self
            .records
            .get_mut(&record_id)
            .ok_or(EngineError::UnknownRecord(record_id))?;

        if slot.record.decision.is_resolved() {
            return Err(EngineError::DuplicateConfirmation(record_id));
        }

        slot.record.decision = decision;
        slot.record.resolved_at = Some(chrono::Utc::now());
        let _ = slot.tx.send(decision);

        match decision {
            ConfirmationDecision::Approved => {
                tracing::info!(record = %record_id, "confirmation approved");
            }
            _ => {
                tracing::warn!(record = %record_id, %decision, "confirmation not approved");
            }
        }

        Ok(slot.record.clone())
    }

    /// Whether an operation may execute right now.
    ///
    /// True iff the operation is not dangerous, or an approved record
    /// exists for it. Absent, pending, and denied records all block.
    #[must_use]
    pub fn may_execute(&self, op: &Operation) -> bool {
        if !op.is_dangerous() {
            return true;
        }
        self.record_for(op.id).is_some_and(|r| r.is_approved())
    }

    /// Current record state by record id
    #[must_use]
    pub fn record(&self, record_id: RecordId) -> Option<ConfirmationRecord> {
        self.records.get(&record_id).map(|s| s.record.clone())
    }

    /// Current record state by operation id
    #[must_use]
    pub fn record_for(&self, operation_id: OperationId) -> Option<ConfirmationRecord> {
        let record_id = *self.by_operation.get(&operation_id)?;
        self.record(record_id)
    }

    /// Suspend until the record is resolved.
    ///
    /// Fail-closed: this waits indefinitely — callers race it against their
    /// own cancellation token if they want to abandon the wait.
    ///
    /// # Errors
    /// Returns `UnknownRecord` if the record does not exist or is dropped
    /// while waiting.
    pub async fn await_decision(
        &self,
        record_id: RecordId,
    ) -> Result<ConfirmationDecision, EngineError> {
        let mut rx = {
            let slot = self
                .records
                .get(&record_id)
                .ok_or(EngineError::UnknownRecord(record_id))?;
            slot.tx.subscribe()
        };

        loop {
            let current = *rx.borrow();
            if current.is_resolved() {
                return Ok(current);
            }
            rx.changed()
                .await
                .map_err(|_| EngineError::UnknownRecord(record_id))?;
        }
    }
}
