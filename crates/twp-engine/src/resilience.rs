//! Resilience wrapper: timeout, cancellation, and bounded retry with
//! exponential backoff and jitter.
//!
//! Retry eligibility is strict: only operations carrying an idempotency key
//! are ever retried, and only for transient failures. Non-idempotent
//! failures surface immediately so the caller can decide on manual
//! remediation. Every attempt is recorded for observability; the record is
//! not part of correctness and may be discarded.

use crate::error::{CallError, EngineError, FailureClass};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use twp_types::{Operation, ResiliencePolicy};

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// Call returned a value
    Success,
    /// Call returned a failure
    Failed {
        /// Failure class
        class: FailureClass,
        /// Failure message
        message: String,
    },
    /// Call exceeded the hard timeout
    TimedOut,
    /// Cancellation signalled before or during the call
    Cancelled,
}

/// One entry in the attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt number (1-based)
    pub attempt: u32,
    /// Delay waited before this attempt
    pub delay: Duration,
    /// What happened
    pub outcome: AttemptOutcome,
}

/// Result of running an operation through the wrapper, with its attempt log.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result surfaced to the caller
    pub result: Result<T, EngineError>,
    /// Per-attempt observability record
    pub attempts: Vec<AttemptRecord>,
}

impl<T> RetryOutcome<T> {
    /// Total attempts made
    #[inline]
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}

/// Jittered backoff delay before attempt `n`.
///
/// Zero for the first attempt; thereafter
/// `min(max_delay, base_delay * 2^(n-2)) * (1 + jitter)` with jitter drawn
/// uniformly from `[-jitter_ratio, +jitter_ratio]`.
#[must_use]
pub fn backoff_delay(policy: &ResiliencePolicy, attempt: u32) -> Duration {
    let raw = policy.raw_delay(attempt);
    if raw.is_zero() || policy.jitter_ratio == 0.0 {
        return raw;
    }
    let jitter = rand::thread_rng().gen_range(-policy.jitter_ratio..=policy.jitter_ratio);
    raw.mul_f64(1.0 + jitter)
}

enum Raced<T> {
    Done(Result<T, CallError>),
    TimedOut,
    Cancelled,
}

/// Executes outbound calls under the resilience contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResilienceWrapper;

impl ResilienceWrapper {
    /// Create a wrapper
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run `action` under timeout, cancellation, and the retry budget.
    ///
    /// The action receives the 1-based attempt number and is re-invoked on
    /// each retry. Cancellation and timeout abandon the in-flight call and
    /// surface `Cancelled`/`Timeout` — never silently swallowed. Retry
    /// delays are non-blocking suspensions raced against the token, so
    /// cancelling also halts pending retry timers.
    pub async fn execute<T, F, Fut>(
        &self,
        op: &Operation,
        policy: &ResiliencePolicy,
        cancel: &CancellationToken,
        mut action: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut attempts = Vec::new();
        let mut attempt: u32 = 1;

        loop {
            let delay = backoff_delay(policy, attempt);
            if !delay.is_zero() {
                tracing::debug!(operation = %op.id, attempt, ?delay, "retry scheduled");
                tokio::select! {
                    () = cancel.cancelled() => {
                        attempts.push(AttemptRecord {
                            attempt,
                            delay,
                            outcome: AttemptOutcome::Cancelled,
                        });
                        return RetryOutcome {
                            result: Err(EngineError::Cancelled(op.id)),
                            attempts,
                        };
                    }
                    () = sleep(delay) => {}
                }
            }

            let raced = tokio::select! {
                () = cancel.cancelled() => Raced::Cancelled,
                res = timeout(policy.call_timeout, action(attempt)) => match res {
                    Ok(inner) => Raced::Done(inner),
                    Err(_elapsed) => Raced::TimedOut,
                },
            };

            match raced {
                Raced::Cancelled => {
                    attempts.push(AttemptRecord {
                        attempt,
                        delay,
                        outcome: AttemptOutcome::Cancelled,
                    });
                    return RetryOutcome {
                        result: Err(EngineError::Cancelled(op.id)),
                        attempts,
                    };
                }

                Raced::Done(Ok(value)) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        delay,
                        outcome: AttemptOutcome::Success,
                    });
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                    };
                }

                Raced::TimedOut => {
                    attempts.push(AttemptRecord {
                        attempt,
                        delay,
                        outcome: AttemptOutcome::TimedOut,
                    });
                    if op.is_idempotent() && attempt < policy.max_attempts {
                        attempt += 1;
                        continue;
                    }
                    let result = if attempt > 1 {
                        tracing::warn!(operation = %op.id, attempts = attempt, "retries exhausted");
                        Err(EngineError::RetriesExhausted {
                            op: op.id,
                            attempts: attempt,
                            last: CallError::transient(format!(
                                "call timed out after {:?}",
                                policy.call_timeout
                            )),
                        })
                    } else {
                        Err(EngineError::Timeout {
                            op: op.id,
                            attempt,
                            timeout: policy.call_timeout,
                        })
                    };
                    return RetryOutcome { result, attempts };
                }

                Raced::Done(Err(cause)) => {
                    attempts.push(AttemptRecord {
                        attempt,
                        delay,
                        outcome: AttemptOutcome::Failed {
                            class: cause.class,
                            message: cause.message.clone(),
                        },
                    });

                    if !op.is_idempotent() {
                        return RetryOutcome {
                            result: Err(EngineError::NonIdempotentFailure { op: op.id, cause }),
                            attempts,
                        };
                    }
                    if !cause.is_transient() {
                        return RetryOutcome {
                            result: Err(EngineError::CallFailed { op: op.id, cause }),
                            attempts,
                        };
                    }
                    if attempt < policy.max_attempts {
                        attempt += 1;
                        continue;
                    }

                    tracing::warn!(operation = %op.id, attempts = attempt, "retries exhausted");
                    return RetryOutcome {
                        result: Err(EngineError::RetriesExhausted {
                            op: op.id,
                            attempts: attempt,
                            last: cause,
                        }),
                        attempts,
                    };
                }
            }
        }
    }
}
