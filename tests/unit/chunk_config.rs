//! Unit tests for dispatch configuration and statistics

use adaptive_dispatcher::dispatcher::config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DELAY_BETWEEN_CHUNKS, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
};
use adaptive_dispatcher::{ChunkConfig, ChunkStats};
use std::time::Duration;

#[test]
fn test_default_config_values() {
    let config = ChunkConfig::default();
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(config.delay_between_chunks, DEFAULT_DELAY_BETWEEN_CHUNKS);
    assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    assert_eq!(config.retry_delay, DEFAULT_RETRY_DELAY);
    assert!(!config.fail_fast);
}

#[test]
fn test_zero_chunk_size_rejected() {
    let result = ChunkConfig::new(0, Duration::ZERO, 0, Duration::ZERO, false);
    assert!(result.is_err());
}

#[test]
fn test_zero_delays_and_retries_accepted() {
    let config = ChunkConfig::new(1, Duration::ZERO, 0, Duration::ZERO, true).unwrap();
    assert_eq!(config.chunk_size, 1);
    assert_eq!(config.max_retries, 0);
    assert!(config.fail_fast);
}

#[test]
fn test_success_rate_on_empty_batch_is_zero() {
    let stats = ChunkStats::default();
    assert_eq!(stats.success_rate(), 0.0);
}

#[test]
fn test_success_rate_counts_only_successes() {
    let stats = ChunkStats {
        total_items: 10,
        successful: 7,
        failed: 3,
        ..ChunkStats::default()
    };
    assert!((stats.success_rate() - 70.0).abs() < 1e-9);
}

#[test]
fn test_format_summary_mentions_counts() {
    let stats = ChunkStats {
        total_items: 4,
        successful: 3,
        failed: 1,
        chunks_processed: 2,
        total_chunks: 2,
        duration: Duration::from_secs(1),
        ..ChunkStats::default()
    };
    let summary = stats.format_summary();
    assert!(summary.contains('3'));
    assert!(summary.contains('4'));
}
