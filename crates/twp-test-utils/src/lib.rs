//! Testing utilities for TWP workspace
//!
//! Shared fixtures for requests, plans, and operations.

#![allow(missing_docs)]

use std::time::Duration;
use twp_types::{
    ChangeRequest, DangerCategory, Operation, OperationKind, PlanArtifact, PlanSection,
    RequestFlags, ResilienceChoice, ResiliencePolicy, REQUIRED_SECTIONS,
};

/// A small, single-module change that should skip the planning phase.
pub fn small_request() -> ChangeRequest {
    ChangeRequest::new("fix off-by-one in pagination").with_module("api")
}

/// A change that trips the multi-module planning trigger.
pub fn multi_module_request() -> ChangeRequest {
    ChangeRequest::new("thread tenant id through storage and api")
        .with_module("storage")
        .with_module("api")
        .with_flags(RequestFlags {
            multi_file: true,
            ..Default::default()
        })
}

/// A schema-change request.
pub fn schema_request() -> ChangeRequest {
    ChangeRequest::new("add soft-delete column to accounts")
        .with_module("storage")
        .with_flags(RequestFlags {
            schema_change: true,
            ..Default::default()
        })
}

/// A plan with every required section filled and a resilience choice for
/// each declared kind.
pub fn complete_plan() -> PlanArtifact {
    let mut plan = PlanArtifact::new();
    for section in REQUIRED_SECTIONS {
        plan = plan.with_section(section, format!("{section} content"));
    }
    plan.with_resilience_choice(
        OperationKind::Database,
        ResilienceChoice {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            idempotent: true,
        },
    )
}

/// A complete plan with one named section removed.
pub fn plan_missing(section: PlanSection) -> PlanArtifact {
    let mut plan = PlanArtifact::new();
    for s in REQUIRED_SECTIONS {
        if s != section {
            plan = plan.with_section(s, format!("{s} content"));
        }
    }
    plan.with_resilience_choice(
        OperationKind::Database,
        ResilienceChoice {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            idempotent: true,
        },
    )
}

/// A destructive database operation requiring confirmation.
pub fn dangerous_db_op() -> Operation {
    Operation::dangerous(DangerCategory::DestructiveDatabase)
}

/// An idempotent network upsert, safe to retry.
pub fn idempotent_network_op() -> Operation {
    Operation::new(OperationKind::Network).with_idempotency_key("upsert-42")
}

/// A fast policy for paused-clock tests: 100ms base, no jitter.
pub fn fast_policy() -> ResiliencePolicy {
    ResiliencePolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        call_timeout: Duration::from_millis(50),
        jitter_ratio: 0.0,
    }
}
