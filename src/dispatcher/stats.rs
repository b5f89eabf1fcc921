//! Running statistics for one batch dispatch.

use std::time::Duration;

use serde::Serialize;

/// Statistics accumulated over one `process_batch` invocation.
///
/// Owned by the dispatcher and mutated only by the future driving the batch;
/// fanned-out item tasks report back through their return values instead of
/// writing shared state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkStats {
    /// Number of items in the batch.
    pub total_items: usize,
    /// Items that produced a value.
    pub successful: usize,
    /// Items that failed (directly or through chunk-retry exhaustion).
    pub failed: usize,
    /// Chunks fully committed so far.
    pub chunks_processed: usize,
    /// Chunks the batch splits into. With adaptive sizing this is finalized
    /// as chunks are cut.
    pub total_chunks: usize,
    /// End-to-end wall time of the batch.
    pub duration: Duration,
    /// Formatted failure messages, in occurrence order.
    pub errors: Vec<String>,
}

impl ChunkStats {
    /// Percentage of items that succeeded (0 when the batch was empty).
    pub fn success_rate(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total_items as f64 * 100.0
    }

    /// End-to-end wall time in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Human-readable one-line summary for logging.
    pub fn format_summary(&self) -> String {
        format!(
            "processed {}/{} chunks - {} ok, {} failed ({:.1}%) in {:.2}s",
            self.chunks_processed,
            self.total_chunks,
            self.successful,
            self.failed,
            self.success_rate(),
            self.duration_seconds()
        )
    }
}
