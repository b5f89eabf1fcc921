//! Integration tests for bounded retry behavior

use adaptive_dispatcher::retry::{retry_if, retry_with_backoff, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_fail_twice_then_succeed_with_exact_backoff() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0);

    let started = tokio::time::Instant::now();
    let result: Result<&str, String> = retry_with_backoff(policy, || {
        let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if attempt <= 2 {
                Err(format!("attempt {attempt} failed"))
            } else {
                Ok("done")
            }
        }
    })
    .await;
    let elapsed = started.elapsed();

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Backoffs of 100ms then 200ms, nothing more.
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(350));
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_last_error_unmodified() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(3, Duration::from_millis(10), 2.0);

    let result: Result<(), String> = retry_with_backoff(policy, || {
        let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Err(format!("failure number {attempt}")) }
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.unwrap_err(), "failure number 3");
}

#[tokio::test]
async fn test_non_retryable_error_returns_immediately() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(5, Duration::from_millis(10), 2.0);

    let result: Result<(), &str> = retry_if(
        policy,
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("bad request") }
        },
        |error| !error.contains("bad request"),
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.unwrap_err(), "bad request");
}

#[tokio::test(start_paused = true)]
async fn test_policy_retry_method_matches_free_function() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(2, Duration::from_millis(10), 2.0);

    let result: Result<u32, String> = policy
        .retry(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt == 1 {
                    Err("once".to_string())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 2);
}
