//! Limiter configuration constants and validation

use std::time::Duration;

use super::LimiterError;

/// Default starting concurrency.
/// Starting at 1 gives the safest cold start against an unknown remote
/// service; the additive-increase path ramps up within a few windows.
pub const DEFAULT_INITIAL_CONCURRENCY: usize = 1;

/// Default upper bound on the concurrency limit.
/// 10 in-flight operations is conservative for LLM-style endpoints; raise it
/// for services with known higher capacity.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Default lower bound on the concurrency limit.
/// The limit never drops below 1 so the batch always makes progress, even
/// while the remote service is throttling.
pub const DEFAULT_MIN_CONCURRENCY: usize = 1;

/// Default latency target for the additive-increase decision.
/// 2 seconds suits slow remote calls (LLM completions, heavy graph queries);
/// observed averages below this grow the limit, above it shrink it gently.
pub const DEFAULT_TARGET_LATENCY: Duration = Duration::from_secs(2);

/// Default number of latency samples per adaptation window.
/// The limit is recomputed once every 10 completed operations, which smooths
/// out single-call jitter without reacting too slowly.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Configuration for [`AdaptiveLimiter`](super::AdaptiveLimiter).
///
/// Immutable after construction; validated by
/// [`AdaptiveLimiter::new`](super::AdaptiveLimiter::new) so invalid values
/// fail up front rather than at call time.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Concurrency limit the limiter starts with.
    pub initial_concurrency: usize,
    /// Upper bound the limit can grow to.
    pub max_concurrency: usize,
    /// Lower bound the limit can shrink to.
    pub min_concurrency: usize,
    /// Average window latency below this target grows the limit.
    pub target_latency: Duration,
    /// Number of latency samples collected before each recompute.
    pub window_size: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            initial_concurrency: DEFAULT_INITIAL_CONCURRENCY,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            min_concurrency: DEFAULT_MIN_CONCURRENCY,
            target_latency: DEFAULT_TARGET_LATENCY,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl LimiterConfig {
    /// Validate configuration bounds.
    pub fn validate(&self) -> Result<(), LimiterError> {
        if self.min_concurrency < 1 {
            return Err(LimiterError::InvalidConfig(
                "min_concurrency must be at least 1".to_string(),
            ));
        }
        if self.initial_concurrency < self.min_concurrency
            || self.initial_concurrency > self.max_concurrency
        {
            return Err(LimiterError::InvalidConfig(format!(
                "initial_concurrency ({}) must lie within [{}, {}]",
                self.initial_concurrency, self.min_concurrency, self.max_concurrency
            )));
        }
        if self.max_concurrency < self.min_concurrency {
            return Err(LimiterError::InvalidConfig(format!(
                "max_concurrency ({}) must be >= min_concurrency ({})",
                self.max_concurrency, self.min_concurrency
            )));
        }
        if self.target_latency.is_zero() {
            return Err(LimiterError::InvalidConfig(
                "target_latency must be positive".to_string(),
            ));
        }
        if self.window_size < 1 {
            return Err(LimiterError::InvalidConfig(
                "window_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
