//! Task Workflow Policy engine.
//!
//! Decision logic for automated change requests, in four parts:
//! 1. **Classification**: does this request need a formal plan?
//! 2. **Workflow gating**: Idle → Plan → Build → Verify → Done, with a
//!    validated plan as the sole gate into Build.
//! 3. **Fail-closed confirmation**: dangerous operations never execute
//!    without an explicit approval; there is no timeout-based auto-approval.
//! 4. **Resilient execution**: every outbound call runs under a hard
//!    timeout, a cancellation token, and a bounded backoff+jitter retry
//!    budget that applies only to idempotent operations.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use twp_engine::prelude::*;
//!
//! let engine = PolicyEngine::new(PolicySet::default());
//! let handle = engine.submit(request)?;
//!
//! if engine.get_state(&handle).await? == WorkflowState::Plan {
//!     engine.submit_plan(&handle, plan).await?;
//! }
//!
//! let op = engine.queue_operation(&handle, operation).await?;
//! let out = engine.execute_operation(&op, |_attempt| async { fetch().await }).await?;
//! ```

pub mod classifier;
pub mod confirmation;
pub mod engine;
pub mod error;
pub mod observer;
pub mod plan_validator;
pub mod resilience;
pub mod state_machine;

pub use engine::{OperationHandle, OperationStatus, PolicyEngine, WorkflowHandle};
pub use error::{CallError, EngineError, FailureClass};

/// Common imports for engine consumers
pub mod prelude {
    pub use crate::classifier::{classify, TriggerDecision, TriggerRule};
    pub use crate::confirmation::ConfirmationGate;
    pub use crate::engine::{OperationHandle, OperationStatus, PolicyEngine, WorkflowHandle};
    pub use crate::error::{CallError, EngineError, FailureClass};
    pub use crate::observer::{MemoryObserver, PolicyObserver, TracingObserver};
    pub use crate::plan_validator::{validate, ValidationResult};
    pub use crate::resilience::{AttemptOutcome, AttemptRecord, ResilienceWrapper, RetryOutcome};
    pub use crate::state_machine::{allowed_transitions, validate_transition};
    pub use twp_types::{
        ChangeRequest, ConfirmationDecision, ConfirmationRecord, DangerCategory, Operation,
        OperationId, OperationKind, PlanArtifact, PlanSection, PolicySet, RecordId, RequestFlags,
        RequestId, ResilienceChoice, ResiliencePolicy, WorkflowState,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
