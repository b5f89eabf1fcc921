//! Adaptive admission-control limiter (AIMD)
//!
//! Bounds the number of concurrently in-flight remote operations and adapts
//! that bound to observed latency and error feedback: additive increase while
//! the service keeps up, multiplicative decrease the moment it pushes back.
//!
//! # Overview
//!
//! Callers wrap each remote call in [`AdaptiveLimiter::acquire`] /
//! [`AdaptiveLimiter::run`]. Releasing the returned [`SlotPermit`] records the
//! call's wall-clock latency; once a full window of samples is collected (or
//! an error is observed) the limit is recomputed:
//!
//! 1. Any error in the window halves the limit (floored at `min_concurrency`)
//! 2. Average latency below `target_latency` grows the limit by 1
//! 3. Otherwise the limit shrinks by 0.5
//!
//! The limit is a smoothed fractional value; admission compares the active
//! count against its floor. Waiters park on a [`Notify`] and are woken on
//! every release, so a freed slot is handed over immediately rather than
//! after a poll interval.
//!
//! # Failure Semantics
//!
//! Errors raised inside the guarded scope are recorded as an error sample and
//! re-propagated unmodified - the limiter never hides failures.

pub mod config;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use config::LimiterConfig;

/// Multiplicative decrease factor applied when a window contains errors.
const DECREASE_FACTOR: f64 = 0.5;

/// Additive increase applied when the window average beats the target.
const INCREASE_STEP: f64 = 1.0;

/// Gentle decrease applied when latency exceeds the target without errors.
const DRIFT_STEP: f64 = 0.5;

/// Limiter errors
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    /// Invalid configuration
    #[error("invalid limiter configuration: {0}")]
    InvalidConfig(String),
}

/// Snapshot of the limiter's adaptation state.
///
/// Mutated only inside the limiter's critical section; read externally via
/// [`AdaptiveLimiter::stats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct LimiterStats {
    /// Last computed concurrency limit (smoothed, fractional).
    pub concurrency: f64,
    /// Operations that completed without error.
    pub success_count: u64,
    /// Windows closed by the multiplicative-decrease path.
    pub throttle_count: u64,
    /// Average latency of the most recently closed window.
    pub avg_latency: Duration,
}

/// State shared by all clones of the limiter and all outstanding permits.
struct Shared {
    state: Mutex<State>,
    /// Wakes waiters on every release and on every recompute. The effective
    /// limit can grow as well as shrink, so both events can free slots.
    notify: Notify,
    min_limit: usize,
    max_limit: usize,
    target_latency: Duration,
    window_size: usize,
}

struct State {
    /// Smoothed fractional limit; admission uses its floor.
    current_limit: f64,
    /// Permits currently held. Never exceeds floor(current_limit) by
    /// construction of the acquire loop.
    active_count: usize,
    latency_window: Vec<Duration>,
    /// Errors observed in the current window; reset on every recompute.
    error_count: u32,
    stats: LimiterStats,
}

/// AIMD admission-control limiter with a dynamically sized permit pool.
///
/// Cheap to clone; all clones share one permit pool.
#[derive(Clone)]
pub struct AdaptiveLimiter {
    shared: Arc<Shared>,
}

impl AdaptiveLimiter {
    /// Create a limiter from a validated configuration.
    ///
    /// # Errors
    /// Returns [`LimiterError::InvalidConfig`] when bounds are inconsistent
    /// (see [`LimiterConfig::validate`]).
    pub fn new(config: LimiterConfig) -> Result<Self, LimiterError> {
        config.validate()?;

        let initial = config.initial_concurrency as f64;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    current_limit: initial,
                    active_count: 0,
                    latency_window: Vec::with_capacity(config.window_size),
                    error_count: 0,
                    stats: LimiterStats {
                        concurrency: initial,
                        ..LimiterStats::default()
                    },
                }),
                notify: Notify::new(),
                min_limit: config.min_concurrency,
                max_limit: config.max_concurrency,
                target_latency: config.target_latency,
                window_size: config.window_size,
            }),
        })
    }

    /// Acquire a slot, suspending until one is free.
    ///
    /// The returned [`SlotPermit`] releases the slot on drop - on every exit
    /// path - recording the elapsed wall-clock time as a latency sample.
    /// Flag failures with [`SlotPermit::mark_error`] (or use
    /// [`AdaptiveLimiter::run`], which does so automatically).
    pub async fn acquire(&self) -> SlotPermit {
        let wait_started = Instant::now();
        loop {
            // Register interest before re-checking the condition so a
            // release between the check and the await is never missed.
            let notified = self.shared.notify.notified();

            if self.try_acquire_slot() {
                let waited = wait_started.elapsed();
                histogram!("limiter_slot_wait_seconds").record(waited.as_secs_f64());
                if waited > Duration::from_millis(100) {
                    debug!(wait_ms = waited.as_millis() as u64, "slot acquired after wait");
                }
                return SlotPermit {
                    shared: Arc::clone(&self.shared),
                    acquired_at: Instant::now(),
                    failed: false,
                };
            }

            notified.await;
        }
    }

    /// Run one guarded operation: acquire a slot, await the future, record
    /// the outcome, and re-propagate the caller's error unmodified.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        let mut permit = self.acquire().await;
        let result = fut.await;
        if result.is_err() {
            permit.mark_error();
        }
        result
    }

    /// Current effective concurrency limit (floor of the smoothed value).
    pub fn current_limit(&self) -> usize {
        self.lock().current_limit.floor() as usize
    }

    /// Number of permits currently held.
    pub fn active(&self) -> usize {
        self.lock().active_count
    }

    /// Snapshot of the adaptation statistics.
    pub fn stats(&self) -> LimiterStats {
        self.lock().stats.clone()
    }

    fn try_acquire_slot(&self) -> bool {
        let mut state = self.lock();
        if state.active_count < state.current_limit.floor() as usize {
            state.active_count += 1;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.lock()
    }
}

impl Default for AdaptiveLimiter {
    fn default() -> Self {
        Self::new(LimiterConfig::default()).expect("default limiter configuration is valid")
    }
}

impl std::fmt::Debug for AdaptiveLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AdaptiveLimiter")
            .field("current_limit", &state.current_limit)
            .field("active_count", &state.active_count)
            .field("window_len", &state.latency_window.len())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock means a panic mid-bookkeeping; the counters are
        // still structurally sound, so recover the guard and continue.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Close the current window and recompute the limit (AIMD).
    ///
    /// Caller must hold the state lock.
    fn recompute(&self, state: &mut State) {
        let window_len = state.latency_window.len();
        let avg_latency = if window_len == 0 {
            Duration::ZERO
        } else {
            state.latency_window.iter().sum::<Duration>() / window_len as u32
        };

        if state.error_count > 0 {
            state.current_limit = (state.current_limit * DECREASE_FACTOR).max(self.min_limit as f64);
            state.stats.throttle_count += 1;
            counter!("limiter_throttle_total").increment(1);
            warn!(
                errors = state.error_count,
                new_limit = state.current_limit,
                "errors observed in window - halving concurrency limit"
            );
        } else if avg_latency < self.target_latency {
            state.current_limit = (state.current_limit + INCREASE_STEP).min(self.max_limit as f64);
            debug!(
                avg_latency_ms = avg_latency.as_millis() as u64,
                new_limit = state.current_limit,
                "window under latency target - growing concurrency limit"
            );
        } else {
            state.current_limit = (state.current_limit - DRIFT_STEP).max(self.min_limit as f64);
            debug!(
                avg_latency_ms = avg_latency.as_millis() as u64,
                new_limit = state.current_limit,
                "window over latency target - easing concurrency limit"
            );
        }

        state.latency_window.clear();
        state.error_count = 0;
        state.stats.avg_latency = avg_latency;
        state.stats.concurrency = state.current_limit;
        gauge!("limiter_concurrency_limit").set(state.current_limit);
    }
}

/// Scoped slot acquisition.
///
/// Dropping the permit - on success, error, or early return - releases the
/// slot, records the elapsed time as a latency sample, and wakes one round of
/// waiters. An error flagged via [`SlotPermit::mark_error`] makes the release
/// close the window immediately with a multiplicative decrease.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct SlotPermit {
    shared: Arc<Shared>,
    acquired_at: Instant,
    failed: bool,
}

impl SlotPermit {
    /// Flag the guarded operation as failed before releasing the slot.
    pub fn mark_error(&mut self) {
        self.failed = true;
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        let elapsed = self.acquired_at.elapsed();
        {
            let mut state = self.shared.lock();
            state.active_count = state.active_count.saturating_sub(1);
            state.latency_window.push(elapsed);
            if self.failed {
                state.error_count += 1;
            } else {
                state.stats.success_count += 1;
            }
            if self.failed || state.latency_window.len() >= self.shared.window_size {
                self.shared.recompute(&mut state);
            }
        }
        // Wake everyone: the freed slot or a raised limit may admit more
        // than one waiter.
        self.shared.notify.notify_waiters();
    }
}
