//! Change-request classification.
//!
//! A pure function over a fixed rule set. Rules are evaluated in priority
//! order and every matching rule is recorded, so the rationale carries the
//! full picture rather than just the first hit.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use twp_types::ChangeRequest;

/// Trigger rules, in evaluation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerRule {
    /// More than one affected module (multi-file/layer change)
    MultiModule,
    /// DB/API contract change
    SchemaChange,
    /// Complex refactor
    ComplexRefactor,
    /// Auth/security middleware change
    AuthRelated,
    /// Nontrivial bugfix spanning multiple modules
    MultiModuleBugfix,
}

impl TriggerRule {
    /// All rules, in evaluation priority order
    pub const ALL: [TriggerRule; 5] = [
        TriggerRule::MultiModule,
        TriggerRule::SchemaChange,
        TriggerRule::ComplexRefactor,
        TriggerRule::AuthRelated,
        TriggerRule::MultiModuleBugfix,
    ];

    /// Whether the rule matches a request
    #[must_use]
    pub fn matches(&self, request: &ChangeRequest) -> bool {
        match self {
            TriggerRule::MultiModule => request.module_count() > 1,
            TriggerRule::SchemaChange => request.flags.schema_change,
            TriggerRule::ComplexRefactor => request.flags.complex_refactor,
            TriggerRule::AuthRelated => request.flags.auth_related,
            TriggerRule::MultiModuleBugfix => {
                request.flags.nontrivial_bugfix && request.module_count() > 1
            }
        }
    }
}

impl std::fmt::Display for TriggerRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriggerRule::MultiModule => "multi_module",
            TriggerRule::SchemaChange => "schema_change",
            TriggerRule::ComplexRefactor => "complex_refactor",
            TriggerRule::AuthRelated => "auth_related",
            TriggerRule::MultiModuleBugfix => "multi_module_bugfix",
        };
        write!(f, "{s}")
    }
}

/// Whether formal planning is mandatory, and why.
///
/// Derived from a request, never mutated. `matched` is ordered by rule
/// priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDecision {
    /// Whether a Plan phase is mandatory
    pub required: bool,
    /// Every rule that matched, in priority order
    pub matched: Vec<TriggerRule>,
}

impl TriggerDecision {
    /// Decision for a request matching no rules
    #[inline]
    #[must_use]
    pub fn not_required() -> Self {
        Self {
            required: false,
            matched: Vec::new(),
        }
    }
}

/// Classify a change request against the fixed rule set.
///
/// # Errors
/// Returns `InvalidRequest` when the request is malformed; malformed
/// requests are rejected before classification.
pub fn classify(request: &ChangeRequest) -> Result<TriggerDecision, EngineError> {
    let missing = request.missing_fields();
    if !missing.is_empty() {
        return Err(EngineError::InvalidRequest { missing });
    }

    let matched: Vec<TriggerRule> = TriggerRule::ALL
        .iter()
        .filter(|rule| rule.matches(request))
        .copied()
        .collect();

    for rule in &matched {
        tracing::debug!(request = %request.id, %rule, "trigger rule matched");
    }

    Ok(TriggerDecision {
        required: !matched.is_empty(),
        matched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use twp_types::RequestFlags;

    #[test]
    fn no_rules_no_plan() {
        let req = ChangeRequest::new("fix typo").with_module("docs");
        let decision = classify(&req).unwrap();
        assert!(!decision.required);
        assert!(decision.matched.is_empty());
    }

    #[test]
    fn multi_module_triggers() {
        let req = ChangeRequest::new("split handler")
            .with_module("api")
            .with_module("core");
        let decision = classify(&req).unwrap();
        assert!(decision.required);
        assert_eq!(decision.matched, vec![TriggerRule::MultiModule]);
    }

    #[test]
    fn all_matching_rules_are_recorded_in_priority_order() {
        let req = ChangeRequest::new("rework session storage")
            .with_module("auth")
            .with_module("db")
            .with_flags(RequestFlags {
                schema_change: true,
                auth_related: true,
                nontrivial_bugfix: true,
                ..Default::default()
            });

        let decision = classify(&req).unwrap();
        assert!(decision.required);
        assert_eq!(
            decision.matched,
            vec![
                TriggerRule::MultiModule,
                TriggerRule::SchemaChange,
                TriggerRule::AuthRelated,
                TriggerRule::MultiModuleBugfix,
            ]
        );
    }

    #[test]
    fn bugfix_in_single_module_does_not_trigger() {
        let req = ChangeRequest::new("off by one")
            .with_module("core")
            .with_flags(RequestFlags {
                nontrivial_bugfix: true,
                ..Default::default()
            });
        let decision = classify(&req).unwrap();
        assert!(!decision.required);
    }

    #[test]
    fn malformed_request_rejected_before_classification() {
        let req = ChangeRequest::new("").with_module("a").with_module("b");
        let err = classify(&req).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest { .. }));
    }
}
