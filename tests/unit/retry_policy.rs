//! Unit tests for retry policy delay computation

use adaptive_dispatcher::retry::{
    RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY,
};
use std::time::Duration;

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(policy.initial_delay, DEFAULT_INITIAL_DELAY);
    assert_eq!(policy.backoff_factor, DEFAULT_BACKOFF_FACTOR);
    assert_eq!(policy.max_delay, DEFAULT_MAX_DELAY);
}

#[test]
fn test_exponential_growth() {
    let policy = RetryPolicy::new(10, Duration::from_secs(1), 2.0);
    assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
    assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
    assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(16));
}

#[test]
fn test_delay_never_exceeds_cap() {
    let policy =
        RetryPolicy::new(100, Duration::from_secs(1), 3.0).with_max_delay(Duration::from_secs(20));
    for attempt in 1..=100 {
        assert!(policy.delay_for_attempt(attempt) <= Duration::from_secs(20));
    }
}

#[test]
fn test_factor_of_one_keeps_delay_constant() {
    let policy = RetryPolicy::new(5, Duration::from_millis(250), 1.0);
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(250));
    assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(250));
}

#[test]
fn test_fractional_factor_shrinks_delay() {
    // An unusual but legal configuration; the formula must still hold.
    let policy = RetryPolicy::new(3, Duration::from_secs(1), 0.5);
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
}
