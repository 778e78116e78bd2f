//! Data model for the Task Workflow Policy engine.
//!
//! This crate defines the entities the engine operates on:
//! - [`ChangeRequest`] — the unit of work submitted for classification
//! - [`PlanArtifact`] — a completeness view over a submitted plan
//! - [`Operation`] — a single action attempted during Build/Verify
//! - [`ResiliencePolicy`] — timeout/retry budget per operation kind
//! - [`ConfirmationRecord`] — the approval state of a dangerous operation
//! - [`WorkflowState`] — the per-request lifecycle state
//!
//! All types here are passive data; the decision logic lives in
//! `twp-engine`.

pub mod ids;
pub mod operation;
pub mod plan;
pub mod policy;
pub mod record;
pub mod request;
pub mod state;

pub use ids::{OperationId, RecordId, RequestId};
pub use operation::{DangerCategory, Operation, OperationKind};
pub use plan::{PlanArtifact, PlanSection, ResilienceChoice, REQUIRED_SECTIONS};
pub use policy::{PolicySet, ResiliencePolicy};
pub use record::{ConfirmationDecision, ConfirmationRecord};
pub use request::{ChangeRequest, RequestFlags};
pub use state::WorkflowState;
