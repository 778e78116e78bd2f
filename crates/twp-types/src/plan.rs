//! Plan artifacts: the completeness view the engine validates.
//!
//! The engine does not own or persist plan content. A `PlanArtifact` is the
//! caller's declaration of which sections exist and which operation kinds
//! the plan intends to use, together with the resilience choices made for
//! each kind.

use crate::operation::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// The fixed set of required plan sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlanSection {
    /// What the change is for
    Objective,
    /// How the change is structured
    Architecture,
    /// DB/storage model changes
    DataModelChanges,
    /// API contract changes
    ApiContracts,
    /// Timeout/retry/idempotency choices per operation kind
    ResilienceDecisions,
    /// How the change will be manually verified
    ManualTestPlan,
}

/// All required sections, in canonical order.
pub const REQUIRED_SECTIONS: [PlanSection; 6] = [
    PlanSection::Objective,
    PlanSection::Architecture,
    PlanSection::DataModelChanges,
    PlanSection::ApiContracts,
    PlanSection::ResilienceDecisions,
    PlanSection::ManualTestPlan,
];

impl PlanSection {
    /// Stable section name used in validation results
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PlanSection::Objective => "objective",
            PlanSection::Architecture => "architecture",
            PlanSection::DataModelChanges => "data_model_changes",
            PlanSection::ApiContracts => "api_contracts",
            PlanSection::ResilienceDecisions => "resilience_decisions",
            PlanSection::ManualTestPlan => "manual_test_plan",
        }
    }
}

impl std::fmt::Display for PlanSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resilience choices declared for one operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceChoice {
    /// Hard timeout for a single call
    pub timeout: Duration,
    /// Retry budget
    pub max_attempts: u32,
    /// Whether calls of this kind carry idempotency keys
    pub idempotent: bool,
}

/// A submitted plan, reduced to what the engine needs to validate it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanArtifact {
    sections: BTreeMap<PlanSection, String>,
    declared_kinds: BTreeSet<OperationKind>,
    resilience_choices: BTreeMap<OperationKind, ResilienceChoice>,
}

impl PlanArtifact {
    /// Create an empty plan
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a section's content
    #[inline]
    #[must_use]
    pub fn with_section(mut self, section: PlanSection, content: impl Into<String>) -> Self {
        self.sections.insert(section, content.into());
        self
    }

    /// Declare an operation kind the plan will use
    #[inline]
    #[must_use]
    pub fn with_declared_kind(mut self, kind: OperationKind) -> Self {
        self.declared_kinds.insert(kind);
        self
    }

    /// Declare the resilience choice for an operation kind.
    ///
    /// Also declares the kind itself.
    #[inline]
    #[must_use]
    pub fn with_resilience_choice(mut self, kind: OperationKind, choice: ResilienceChoice) -> Self {
        self.declared_kinds.insert(kind);
        self.resilience_choices.insert(kind, choice);
        self
    }

    /// Whether a section exists with non-empty content
    #[must_use]
    pub fn has_section(&self, section: PlanSection) -> bool {
        self.sections
            .get(&section)
            .is_some_and(|c| !c.trim().is_empty())
    }

    /// Operation kinds the plan declares it will use
    #[must_use]
    pub fn declared_kinds(&self) -> &BTreeSet<OperationKind> {
        &self.declared_kinds
    }

    /// Declared kinds without a resilience choice
    #[must_use]
    pub fn kinds_without_choice(&self) -> Vec<OperationKind> {
        self.declared_kinds
            .iter()
            .filter(|k| !self.resilience_choices.contains_key(k))
            .copied()
            .collect()
    }

    /// The resilience choice declared for a kind, if any
    #[must_use]
    pub fn resilience_choice(&self, kind: OperationKind) -> Option<&ResilienceChoice> {
        self.resilience_choices.get(&kind)
    }
}
