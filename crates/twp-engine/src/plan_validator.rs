//! Plan artifact validation.
//!
//! Deterministic and total: always returns, never blocks. This is the sole
//! gate for the Plan → Build transition.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use twp_types::{PlanArtifact, PlanSection, REQUIRED_SECTIONS};

/// Outcome of validating a plan artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether every required section is present and well-formed
    pub valid: bool,
    /// Names of the sections that are missing or incomplete
    pub missing: BTreeSet<String>,
}

impl ValidationResult {
    /// Convert into a `Result`, mapping invalid plans to
    /// `ValidationIncomplete`.
    ///
    /// # Errors
    /// Returns `ValidationIncomplete` carrying the missing section names.
    pub fn into_result(self) -> Result<(), EngineError> {
        if self.valid {
            Ok(())
        } else {
            Err(EngineError::ValidationIncomplete {
                missing: self.missing,
            })
        }
    }
}

/// Validate a plan artifact against the fixed required-section schema.
///
/// A section counts as present only if non-empty. `resilience_decisions`
/// additionally requires a declared choice for every operation kind the
/// plan says it will use.
#[must_use]
pub fn validate(plan: &PlanArtifact) -> ValidationResult {
    let mut missing = BTreeSet::new();

    for section in REQUIRED_SECTIONS {
        if !plan.has_section(section) {
            missing.insert(section.name().to_string());
        }
    }

    if !plan.kinds_without_choice().is_empty() {
        missing.insert(PlanSection::ResilienceDecisions.name().to_string());
    }

    ValidationResult {
        valid: missing.is_empty(),
        missing,
    }
}
