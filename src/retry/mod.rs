//! Bounded retries with exponential backoff
//!
//! Wraps a single async operation so transient failures are retried with an
//! exponentially growing delay. There is no shared state: a [`RetryPolicy`]
//! is a plain value, safe to use concurrently from any number of call sites.
//!
//! Retries on everything by default ([`retry_with_backoff`]); use
//! [`retry_if`] to stop early on errors that will never succeed (bad
//! arguments, authorization failures, and so on). After the final attempt
//! the last error is returned unmodified.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use metrics::histogram;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default total attempts (initial try plus retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
/// 1 second is long enough for rate-limit windows to reset but short enough
/// to not overly delay recovery from transient errors.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default multiplier applied to the delay after each failed attempt.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Default cap on the computed backoff delay.
/// 30 seconds prevents excessive wait times on later attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Retry parameters for one call site.
///
/// Immutable per call; copy it freely.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the initial try. Treated as at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    /// Upper bound on the computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default delay cap.
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_factor,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Override the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Backoff delay after the given failed attempt (1-based):
    /// `initial_delay * backoff_factor^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = self.backoff_factor.powi(exponent as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Wrap `op` with this policy; sugar for [`retry_with_backoff`].
    pub async fn retry<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        retry_with_backoff(*self, op).await
    }
}

/// Retry `op` on every failure until the policy's attempts run out, sleeping
/// the computed backoff between attempts. The last error is returned
/// unmodified.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    retry_if(policy, op, |_| true).await
}

/// Retry `op` on failures accepted by `should_retry`; rejected errors are
/// returned immediately. The last error is returned unmodified once the
/// policy's attempts run out.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: RetryPolicy,
    mut op: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, max_attempts, "retry attempt succeeded");
                }
                return Ok(value);
            }
            Err(error) => {
                if attempt >= max_attempts {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %error,
                        "retries exhausted"
                    );
                    return Err(error);
                }
                if !should_retry(&error) {
                    debug!(attempt, error = %error, "error is not retryable");
                    return Err(error);
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    backoff_ms = delay.as_millis() as u64,
                    error = %error,
                    "attempt failed - retrying after backoff"
                );
                histogram!("retry_backoff_seconds").record(delay.as_secs_f64());
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
