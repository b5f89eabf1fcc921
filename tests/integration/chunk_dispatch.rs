//! Integration tests for chunked batch dispatch

use adaptive_dispatcher::dispatcher::{AdaptiveChunkProcessor, ItemError};
use adaptive_dispatcher::{ChunkConfig, ChunkDispatcher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn config(chunk_size: usize, max_retries: u32, fail_fast: bool) -> ChunkConfig {
    ChunkConfig::new(chunk_size, Duration::ZERO, max_retries, Duration::ZERO, fail_fast).unwrap()
}

#[tokio::test]
async fn test_batch_of_25_doubled_in_three_chunks() {
    let mut dispatcher = ChunkDispatcher::new(config(10, 0, false));
    let results = dispatcher
        .process_batch((0u64..25).collect(), |item| async move {
            Ok::<_, String>(item * 2)
        })
        .await;

    let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
    let expected: Vec<u64> = (0..25).map(|i| i * 2).collect();
    assert_eq!(values, expected);

    let stats = dispatcher.get_stats();
    assert_eq!(stats.total_chunks, 3);
    assert_eq!(stats.chunks_processed, 3);
    assert_eq!(stats.successful, 25);
    assert_eq!(stats.failed, 0);
    assert!((stats.success_rate() - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_failure_lands_in_its_own_slot_only() {
    let mut dispatcher = ChunkDispatcher::new(config(4, 0, false));
    let results = dispatcher
        .process_batch((0u64..10).collect(), |item| async move {
            if item == 5 {
                Err("item 5 exploded".to_string())
            } else {
                Ok(item)
            }
        })
        .await;

    for (i, outcome) in results.iter().enumerate() {
        if i == 5 {
            let err = outcome.as_ref().unwrap_err();
            assert_eq!(err.index(), 5);
            assert!(err.to_string().contains("item 5 exploded"));
        } else {
            assert_eq!(*outcome.as_ref().unwrap(), i as u64);
        }
    }

    let stats = dispatcher.get_stats();
    assert_eq!(stats.successful, 9);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_fail_fast_exhaustion_marks_whole_chunk() {
    let calls = AtomicU32::new(0);
    let mut dispatcher = ChunkDispatcher::new(config(3, 2, true));
    let results = dispatcher
        .process_batch((0u64..3).collect(), |item| {
            if item == 1 {
                calls.fetch_add(1, Ordering::SeqCst);
            }
            async move {
                if item == 1 {
                    Err("permanent failure".to_string())
                } else {
                    Ok(item)
                }
            }
        })
        .await;

    // 1 initial attempt + 2 retries on the failing item.
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    for (i, outcome) in results.iter().enumerate() {
        match outcome.as_ref().unwrap_err() {
            ItemError::ChunkRetriesExhausted { index, attempts, message } => {
                assert_eq!(*index, i);
                assert_eq!(*attempts, 3);
                assert!(message.contains("permanent failure"));
            }
            other => panic!("expected ChunkRetriesExhausted, got {other:?}"),
        }
    }
    assert_eq!(dispatcher.get_stats().failed, 3);
}

#[tokio::test]
async fn test_fail_fast_retry_can_recover() {
    let calls = AtomicU32::new(0);
    let mut dispatcher = ChunkDispatcher::new(config(2, 3, true));
    let results = dispatcher
        .process_batch((0u64..2).collect(), |item| {
            let attempt = if item == 0 {
                calls.fetch_add(1, Ordering::SeqCst) + 1
            } else {
                0
            };
            async move {
                if item == 0 && attempt < 3 {
                    Err(format!("transient failure on attempt {attempt}"))
                } else {
                    Ok(item + 10)
                }
            }
        })
        .await;

    assert_eq!(*results[0].as_ref().unwrap(), 10);
    assert_eq!(*results[1].as_ref().unwrap(), 11);
    assert_eq!(dispatcher.get_stats().successful, 2);
}

#[tokio::test(start_paused = true)]
async fn test_delay_applied_between_chunks_but_not_after_last() {
    let config =
        ChunkConfig::new(5, Duration::from_secs(1), 0, Duration::ZERO, false).unwrap();
    let mut dispatcher = ChunkDispatcher::new(config);

    let started = tokio::time::Instant::now();
    dispatcher
        .process_batch((0u64..15).collect(), |item| async move {
            Ok::<_, String>(item)
        })
        .await;
    let elapsed = started.elapsed();

    // Three chunks of instant items: exactly two inter-chunk pauses.
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_millis(2100));
}

#[tokio::test(start_paused = true)]
async fn test_adaptive_processor_grows_on_fast_chunks() {
    let mut processor = AdaptiveChunkProcessor::new(
        ChunkConfig::new(4, Duration::ZERO, 0, Duration::ZERO, false).unwrap(),
        2,
        16,
    )
    .unwrap();

    processor
        .process_batch((0u64..24).collect(), |item| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, String>(item)
        })
        .await;

    // 10ms per item is far under the fast threshold: size steps up.
    assert!(processor.current_chunk_size() > 4);
    assert_eq!(processor.get_stats().successful, 24);
}
