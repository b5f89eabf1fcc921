//! Chunk-size self-tuning dispatch variant.
//!
//! [`AdaptiveChunkProcessor`] watches how long each chunk takes per item and
//! grows or shrinks the next chunk accordingly. The heuristic is deliberately
//! independent of the admission-control limiter: the two are separate tunable
//! knobs with no combined control law.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use metrics::histogram;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::config::{ChunkConfig, ConfigError};
use super::stats::ChunkStats;
use super::{commit_outcomes, dispatch_chunk, ItemError};

/// Per-item wall time above which the next chunk shrinks.
/// 2 seconds per item means the remote service is struggling; smaller bursts
/// reduce the pressure.
pub const SLOW_ITEM_THRESHOLD: Duration = Duration::from_secs(2);

/// Per-item wall time below which the next chunk grows.
/// Under 500ms per item the service has headroom for bigger bursts.
pub const FAST_ITEM_THRESHOLD: Duration = Duration::from_millis(500);

/// How many items the chunk size moves per adjustment.
pub const CHUNK_SIZE_STEP: usize = 2;

/// Dispatches a batch in chunks whose size self-tunes from observed latency.
pub struct AdaptiveChunkProcessor {
    config: ChunkConfig,
    min_chunk_size: usize,
    max_chunk_size: usize,
    current_chunk_size: usize,
    stats: ChunkStats,
}

impl AdaptiveChunkProcessor {
    /// Create a processor whose chunk size starts at `config.chunk_size`
    /// (clamped into `[min_chunk_size, max_chunk_size]`).
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidChunkBounds`] unless
    /// `1 <= min_chunk_size <= max_chunk_size`.
    pub fn new(
        config: ChunkConfig,
        min_chunk_size: usize,
        max_chunk_size: usize,
    ) -> Result<Self, ConfigError> {
        if min_chunk_size < 1 || min_chunk_size > max_chunk_size {
            return Err(ConfigError::InvalidChunkBounds {
                min: min_chunk_size,
                max: max_chunk_size,
            });
        }
        let current_chunk_size = config.chunk_size.clamp(min_chunk_size, max_chunk_size);
        Ok(Self {
            config,
            min_chunk_size,
            max_chunk_size,
            current_chunk_size,
            stats: ChunkStats::default(),
        })
    }

    /// Chunk size the next chunk will be cut at.
    pub fn current_chunk_size(&self) -> usize {
        self.current_chunk_size
    }

    /// Statistics of the most recent batch.
    pub fn get_stats(&self) -> ChunkStats {
        self.stats.clone()
    }

    /// Process `items` in adaptively sized chunks, returning one outcome per
    /// input in input order.
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

    /// Like [`AdaptiveChunkProcessor::process_batch`], invoking
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
        self.stats = ChunkStats {
            total_items,
            ..ChunkStats::default()
        };

        let started = Instant::now();
        let mut results = Vec::with_capacity(total_items);

        if total_items == 0 {
            self.stats.duration = started.elapsed();
            return results;
        }

        let mut next = 0;
        while next < total_items {
            let take = self.current_chunk_size.min(total_items - next);
            let chunk = &items[next..next + take];

            let chunk_started = Instant::now();
            let outcomes = dispatch_chunk(chunk, next, &process_fn, &self.config).await;
            let chunk_elapsed = chunk_started.elapsed();
            histogram!("dispatch_chunk_duration_seconds").record(chunk_elapsed.as_secs_f64());

            commit_outcomes(&mut self.stats, outcomes, &mut results);
            self.stats.chunks_processed += 1;
            // Chunk sizes move as we go, so the chunk count is only known
            // once the batch finishes.
            self.stats.total_chunks = self.stats.chunks_processed;
            progress_fn(results.len(), total_items);

            self.retune(chunk_elapsed, take);

            next += take;
            if next < total_items && !self.config.delay_between_chunks.is_zero() {
                sleep(self.config.delay_between_chunks).await;
            }
        }

        self.stats.duration = started.elapsed();
        info!("{}", self.stats.format_summary());
        results
    }

    /// Adjust the chunk size from the just-finished chunk's per-item wall
    /// time.
    fn retune(&mut self, chunk_elapsed: Duration, chunk_len: usize) {
        if chunk_len == 0 {
            return;
        }
        let per_item = chunk_elapsed / chunk_len as u32;

        let previous = self.current_chunk_size;
        if per_item > SLOW_ITEM_THRESHOLD {
            self.current_chunk_size = self
                .current_chunk_size
                .saturating_sub(CHUNK_SIZE_STEP)
                .max(self.min_chunk_size);
        } else if per_item < FAST_ITEM_THRESHOLD {
            self.current_chunk_size = (self.current_chunk_size + CHUNK_SIZE_STEP)
                .min(self.max_chunk_size);
        }

        if self.current_chunk_size != previous {
            debug!(
                per_item_ms = per_item.as_millis() as u64,
                previous,
                next = self.current_chunk_size,
                "retuned chunk size"
            );
        }
    }
}
