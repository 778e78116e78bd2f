//! Resilience policies: timeout and retry budgets per operation kind.

use crate::operation::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Timeout and bounded-retry budget applied to outbound calls.
///
/// Retry only ever applies when the underlying operation carries an
/// idempotency key; the policy itself just sets the budget and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResiliencePolicy {
    /// Total attempt budget, including the first attempt (>= 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Cap on the exponential delay growth
    pub max_delay: Duration,
    /// Hard timeout on a single call
    pub call_timeout: Duration,
    /// Uniform jitter ratio in [0, 1]
    pub jitter_ratio: f64,
}

impl ResiliencePolicy {
    /// Create a policy, clamping fields into their valid ranges
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        call_timeout: Duration,
        jitter_ratio: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            call_timeout,
            jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
        }
    }

    /// Single-attempt policy: timeout only, no retry
    #[must_use]
    pub fn single_attempt(call_timeout: Duration) -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, call_timeout, 0.0)
    }

    /// Un-jittered exponential delay before attempt `n` (n >= 2):
    /// `min(max_delay, base_delay * 2^(n-2))`.
    #[must_use]
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let shift = attempt - 2;
        // Saturate rather than overflow for absurd attempt counts.
        let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor.min(u32::MAX as u64) as u32)
            .unwrap_or(Duration::MAX);
        delay.min(self.max_delay)
    }
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            jitter_ratio: 0.25,
        }
    }
}

/// Per-kind policy table.
///
/// Policies are configured per [`OperationKind`], never per call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySet {
    default: ResiliencePolicy,
    overrides: BTreeMap<OperationKind, ResiliencePolicy>,
}

impl PolicySet {
    /// Create a policy set with the given default
    #[inline]
    #[must_use]
    pub fn new(default: ResiliencePolicy) -> Self {
        Self {
            default,
            overrides: BTreeMap::new(),
        }
    }

    /// Override the policy for one kind
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, kind: OperationKind, policy: ResiliencePolicy) -> Self {
        self.overrides.insert(kind, policy);
        self
    }

    /// Policy applicable to a kind
    #[inline]
    #[must_use]
    pub fn policy_for(&self, kind: OperationKind) -> ResiliencePolicy {
        self.overrides.get(&kind).copied().unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_ratio_is_clamped() {
        let p = ResiliencePolicy::new(
            0,
            Duration::from_millis(100),
            Duration::from_secs(1),
            Duration::from_secs(1),
            3.5,
        );
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.jitter_ratio, 1.0);
    }

    #[test]
    fn raw_delay_doubles_then_caps() {
        let p = ResiliencePolicy::new(
            6,
            Duration::from_millis(100),
            Duration::from_millis(350),
            Duration::from_secs(1),
            0.0,
        );
        assert_eq!(p.raw_delay(1), Duration::ZERO);
        assert_eq!(p.raw_delay(2), Duration::from_millis(100));
        assert_eq!(p.raw_delay(3), Duration::from_millis(200));
        assert_eq!(p.raw_delay(4), Duration::from_millis(350));
        assert_eq!(p.raw_delay(5), Duration::from_millis(350));
    }

    #[test]
    fn policy_set_falls_back_to_default() {
        let set = PolicySet::new(ResiliencePolicy::default()).with_policy(
            OperationKind::Network,
            ResiliencePolicy::single_attempt(Duration::from_secs(2)),
        );

        assert_eq!(set.policy_for(OperationKind::Network).max_attempts, 1);
        assert_eq!(set.policy_for(OperationKind::Database).max_attempts, 3);
    }
}
