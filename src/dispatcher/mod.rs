//! Chunked batch dispatch
//!
//! Processes a large ordered list of items with bounded, observable,
//! restartable concurrency.
//!
//! # Overview
//!
//! [`ChunkDispatcher::process_batch`] splits the input into consecutive
//! chunks, fans each chunk out concurrently, and fans results back into the
//! original input order. Chunks are strictly sequential: chunk *N+1* is never
//! dispatched before chunk *N* has fully completed, and an inter-chunk delay
//! keeps batch throughput below the remote service's tolerance.
//!
//! Per-item failures are recorded in the item's output slot and in
//! [`ChunkStats`] - `process_batch` never raises for ordinary item failures.
//! With `fail_fast` enabled, the first item failure aborts the chunk attempt
//! and the whole chunk is retried up to `max_retries` times; exhausted
//! retries mark every item of that chunk as failed.
//!
//! [`AdaptiveChunkProcessor`] additionally retunes its own chunk size from
//! observed per-chunk latency, independent of any admission-control limiter.
//!
//! # Components
//!
//! - [`config`] - Configuration and validation
//! - [`stats`] - Per-batch statistics
//! - [`adaptive`] - Chunk-size self-tuning variant

pub mod adaptive;
pub mod config;
pub mod stats;

use std::fmt;
use std::future::Future;

use futures_util::future::{join_all, try_join_all};
use metrics::{counter, histogram};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub use adaptive::AdaptiveChunkProcessor;
pub use config::{ChunkConfig, ConfigError};
pub use stats::ChunkStats;

/// Per-item failure recorded in the item's output slot.
///
/// Keeping failures as values (rather than a null-like sentinel) preserves
/// the distinction between "item legitimately produced nothing" and "item
/// failed".
#[derive(Debug, Clone, thiserror::Error)]
pub enum ItemError {
    /// The item's own operation failed.
    #[error("item {index} failed: {message}")]
    Failed {
        /// Index of the item in the input batch.
        index: usize,
        /// Formatted message of the underlying error.
        message: String,
    },

    /// The item's chunk kept failing until its retries ran out.
    #[error("item {index} dropped after {attempts} chunk attempts: {message}")]
    ChunkRetriesExhausted {
        /// Index of the item in the input batch.
        index: usize,
        /// Total chunk attempts made (initial try plus retries).
        attempts: u32,
        /// Formatted message of the last chunk-level error.
        message: String,
    },
}

impl ItemError {
    /// Index of the failed item in the input batch.
    pub fn index(&self) -> usize {
        match self {
            Self::Failed { index, .. } | Self::ChunkRetriesExhausted { index, .. } => *index,
        }
    }
}

/// Dispatches a batch in fixed-size chunks.
pub struct ChunkDispatcher {
    config: ChunkConfig,
    stats: ChunkStats,
}

impl ChunkDispatcher {
    /// Create a dispatcher with the given configuration.
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            stats: ChunkStats::default(),
        }
    }

    /// Statistics of the most recent batch.
    pub fn get_stats(&self) -> ChunkStats {
        self.stats.clone()
    }

    /// Process `items` in chunks of `chunk_size`, returning one outcome per
    /// input in input order.
    ///
    /// `process_fn` is treated as an opaque async operation: the dispatcher
    /// only requires it to be awaitable and to return `Err` on failure.
    pub async fn process_batch<T, R, E, F, Fut>(
        &mut self,
        items: Vec<T>,
        process_fn: F,
    ) -> Vec<Result<R, ItemError>>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: fmt::Display,
    {
        self.process_batch_with_progress(items, process_fn, |_, _| {})
            .await
    }

    /// Like [`ChunkDispatcher::process_batch`], invoking
    /// `progress_fn(items_completed, total_items)` after every chunk.
    pub async fn process_batch_with_progress<T, R, E, F, Fut, P>(
        &mut self,
        items: Vec<T>,
        process_fn: F,
        mut progress_fn: P,
    ) -> Vec<Result<R, ItemError>>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: fmt::Display,
        P: FnMut(usize, usize),
    {
        let total_items = items.len();
        let total_chunks = total_items.div_ceil(self.config.chunk_size);
        self.stats = ChunkStats {
            total_items,
            total_chunks,
            ..ChunkStats::default()
        };

        let started = Instant::now();
        let mut results = Vec::with_capacity(total_items);

        if total_items == 0 {
            self.stats.duration = started.elapsed();
            return results;
        }

        debug!(
            total_items,
            total_chunks,
            chunk_size = self.config.chunk_size,
            "starting batch dispatch"
        );

        for (chunk_index, chunk) in items.chunks(self.config.chunk_size).enumerate() {
            let base_index = chunk_index * self.config.chunk_size;
            let chunk_started = Instant::now();
            let outcomes = dispatch_chunk(chunk, base_index, &process_fn, &self.config).await;
            histogram!("dispatch_chunk_duration_seconds")
                .record(chunk_started.elapsed().as_secs_f64());

            commit_outcomes(&mut self.stats, outcomes, &mut results);
            self.stats.chunks_processed += 1;
            progress_fn(results.len(), total_items);

            let is_last = chunk_index + 1 == total_chunks;
            if !is_last && !self.config.delay_between_chunks.is_zero() {
                sleep(self.config.delay_between_chunks).await;
            }
        }

        self.stats.duration = started.elapsed();
        info!("{}", self.stats.format_summary());
        results
    }
}

/// Run one chunk to completion, retrying the whole chunk on chunk-level
/// failure (reachable only in fail-fast mode). Exhausted retries mark every
/// item of the chunk as failed.
async fn dispatch_chunk<T, R, E, F, Fut>(
    chunk: &[T],
    base_index: usize,
    process_fn: &F,
    config: &ChunkConfig,
) -> Vec<Result<R, ItemError>>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: fmt::Display,
{
    let max_attempts = config.max_retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        match run_chunk_once(chunk, base_index, process_fn, config.fail_fast).await {
            Ok(outcomes) => {
                if attempt > 1 {
                    info!(attempt, max_attempts, "chunk attempt succeeded after retry");
                }
                return outcomes;
            }
            Err(message) => {
                warn!(
                    attempt,
                    max_attempts,
                    error = %message,
                    "chunk attempt failed"
                );
                counter!("dispatch_chunk_retries_total").increment(1);
                last_error = message;
                if attempt < max_attempts && !config.retry_delay.is_zero() {
                    sleep(config.retry_delay).await;
                }
            }
        }
    }

    warn!(
        base_index,
        chunk_len = chunk.len(),
        "chunk retries exhausted - marking every item in the chunk as failed"
    );
    (0..chunk.len())
        .map(|offset| {
            Err(ItemError::ChunkRetriesExhausted {
                index: base_index + offset,
                attempts: max_attempts,
                message: last_error.clone(),
            })
        })
        .collect()
}

/// Fan a chunk out concurrently and fan results back in input order.
///
/// Non-fail-fast mode captures per-item errors in their output slots and
/// never fails at chunk level. Fail-fast mode aborts the gather on the first
/// item error, returning it as a chunk-level error.
async fn run_chunk_once<T, R, E, F, Fut>(
    chunk: &[T],
    base_index: usize,
    process_fn: &F,
    fail_fast: bool,
) -> Result<Vec<Result<R, ItemError>>, String>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: fmt::Display,
{
    if fail_fast {
        let futures = chunk.iter().cloned().enumerate().map(|(offset, item)| {
            let index = base_index + offset;
            let fut = process_fn(item);
            async move { fut.await.map_err(|e| format!("item {index} failed: {e}")) }
        });
        let values = try_join_all(futures).await?;
        Ok(values.into_iter().map(Ok).collect())
    } else {
        let futures = chunk.iter().cloned().enumerate().map(|(offset, item)| {
            let index = base_index + offset;
            let fut = process_fn(item);
            async move {
                fut.await.map_err(|e| ItemError::Failed {
                    index,
                    message: e.to_string(),
                })
            }
        });
        Ok(join_all(futures).await)
    }
}

/// Fold a chunk's outcomes into the running stats and the ordered results.
fn commit_outcomes<R>(
    stats: &mut ChunkStats,
    outcomes: Vec<Result<R, ItemError>>,
    results: &mut Vec<Result<R, ItemError>>,
) {
    for outcome in outcomes {
        match &outcome {
            Ok(_) => {
                stats.successful += 1;
                counter!("dispatch_items_total", "outcome" => "success").increment(1);
            }
            Err(error) => {
                stats.failed += 1;
                stats.errors.push(error.to_string());
                counter!("dispatch_items_total", "outcome" => "failed").increment(1);
            }
        }
        results.push(outcome);
    }
}
