//! Integration tests for adaptive admission control

use adaptive_dispatcher::limiter::{AdaptiveLimiter, LimiterConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config(initial: usize, max: usize, window: usize) -> LimiterConfig {
    LimiterConfig {
        initial_concurrency: initial,
        max_concurrency: max,
        min_concurrency: 1,
        target_latency: Duration::from_secs(2),
        window_size: window,
    }
}

#[tokio::test]
async fn test_limit_grows_one_per_fast_window_until_cap() {
    let limiter = AdaptiveLimiter::new(config(1, 3, 2)).unwrap();

    // Three full windows of near-zero latency: 1 -> 2 -> 3 -> capped at 3.
    for expected in [2, 3, 3] {
        for _ in 0..2 {
            drop(limiter.acquire().await);
        }
        assert_eq!(limiter.current_limit(), expected);
    }
}

#[tokio::test]
async fn test_single_error_halves_limit_immediately() {
    let limiter = AdaptiveLimiter::new(config(8, 10, 100)).unwrap();

    let mut permit = limiter.acquire().await;
    permit.mark_error();
    drop(permit);

    // The error closes the window without waiting for 100 samples.
    assert_eq!(limiter.current_limit(), 4);
    assert_eq!(limiter.stats().throttle_count, 1);
}

#[tokio::test]
async fn test_repeated_errors_clamp_at_min() {
    let limiter = AdaptiveLimiter::new(config(8, 10, 100)).unwrap();

    for _ in 0..6 {
        let result: Result<(), &str> = limiter.run(async { Err("throttled") }).await;
        assert!(result.is_err());
    }
    assert_eq!(limiter.current_limit(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_active_count_never_exceeds_limit() {
    // Window larger than the task count keeps the limit fixed at 2.
    let limiter = AdaptiveLimiter::new(config(2, 10, 100)).unwrap();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let limiter = limiter.clone();
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            limiter
                .run(async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(limiter.active(), 0);
}

#[tokio::test]
async fn test_waiters_are_woken_without_polling() {
    // Limit pinned at 1; every waiter must still get through.
    let limiter = AdaptiveLimiter::new(config(1, 10, 1000)).unwrap();

    let mut handles = Vec::new();
    for i in 0u64..20 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            limiter.run(async move { Ok::<_, String>(i) }).await
        }));
    }

    let all = futures_util::future::join_all(handles);
    let results = tokio::time::timeout(Duration::from_secs(5), all)
        .await
        .expect("waiters must not starve");
    for result in results {
        assert!(result.unwrap().is_ok());
    }
    assert_eq!(limiter.stats().success_count, 20);
}

#[tokio::test]
async fn test_error_propagates_unmodified_through_run() {
    let limiter = AdaptiveLimiter::new(config(4, 10, 10)).unwrap();
    let result: Result<u32, String> = limiter
        .run(async { Err("upstream said 429".to_string()) })
        .await;
    assert_eq!(result.unwrap_err(), "upstream said 429");
}
