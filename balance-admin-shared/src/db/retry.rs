/// Bounded retry with exponential backoff and jitter
///
/// The delay before retry `n` (1-based, counting the failed attempt) is
/// `base_delay * 2^(n-1)` plus a uniformly random jitter of up to 10% of that
/// value. Jitter spreads out retries from requests that failed together.
///
/// ```text
/// attempt 1 ── fail ──> sleep ~1s  ──> attempt 2 ── fail ──> sleep ~2s ──> attempt 3
/// ```
///
/// The policy deadline is a [`Budget`] shared by every attempt and sleep. No
/// attempt starts once it is spent, and a retry whose backoff would outlast
/// it is abandoned instead of slept through.

use crate::db::error::{Retryable, StoreError};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default number of attempts (including the first one)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default total wall-clock budget for one unit of work
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Maximum jitter as a fraction of the exponential delay
const JITTER_FRACTION: f64 = 0.1;

/// Retry policy for units of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for every retry after that
    pub base_delay: Duration,

    /// Upper bound on attempts plus backoff; `None` disables the bound
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            deadline: Some(DEFAULT_DEADLINE),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Exponential delay for the retry that follows `attempt`, without jitter
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Delay for the retry that follows `attempt`, with jitter applied
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.exponential_delay(attempt);
        let jitter = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
        delay + delay.mul_f64(jitter)
    }
}

/// Wall-clock budget of one unit of work, started when it is first run
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    limit: Option<Duration>,
    started: Instant,
}

impl Budget {
    pub fn start(policy: &RetryPolicy) -> Self {
        Self {
            limit: policy.deadline,
            started: Instant::now(),
        }
    }

    /// Total budget; `None` when unbounded
    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// Time left; `None` when unbounded, zero once spent
    pub fn remaining(&self) -> Option<Duration> {
        self.limit
            .map(|limit| limit.saturating_sub(self.started.elapsed()))
    }

    pub fn is_spent(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }

    /// The error reported when the budget runs out
    pub fn exceeded(&self) -> StoreError {
        StoreError::DeadlineExceeded(self.limit.unwrap_or_default())
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// or `policy.max_attempts` is reached
///
/// The closure receives the 1-based attempt number. Errors whose
/// [`Retryable::is_retryable`] returns `false` are returned on first
/// occurrence. When attempts run out the last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    attempt_fn: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + From<StoreError> + Display,
{
    retry_within(policy, Budget::start(policy), operation, attempt_fn).await
}

/// [`retry_with_backoff`] against a budget the caller already started
///
/// Lets the attempts themselves see the same budget (see
/// [`crate::db::executor`]). The budget is only checked between attempts
/// here; an attempt in flight is never cancelled.
pub async fn retry_within<T, E, F, Fut>(
    policy: &RetryPolicy,
    budget: Budget,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + From<StoreError> + Display,
{
    let mut last_error: Option<E> = None;

    for attempt in 1..=policy.max_attempts {
        if budget.is_spent() {
            warn!(operation, attempt, "Deadline reached before attempt");
            return Err(budget.exceeded().into());
        }

        match attempt_fn(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if attempt == policy.max_attempts {
                    last_error = Some(err);
                    break;
                }

                let delay = policy.backoff_delay(attempt);
                if budget.remaining().is_some_and(|remaining| delay >= remaining) {
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Backoff would outlast the deadline, giving up"
                    );
                    return Err(budget.exceeded().into());
                }

                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Database operation failed, retrying"
                );
                last_error = Some(err);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| StoreError::RetriesExhausted(policy.max_attempts).into()))
}
