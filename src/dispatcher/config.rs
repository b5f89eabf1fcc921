//! Dispatch configuration constants and validation

use std::time::Duration;

/// Default number of items fanned out per chunk.
/// 10 concurrent remote calls per chunk keeps bursts small enough for
/// rate-limited endpoints while amortizing the inter-chunk delay.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Default pause between consecutive chunks.
/// 1 second of breathing room keeps batch throughput below a remote
/// service's tolerance independent of any admission-control limiter.
pub const DEFAULT_DELAY_BETWEEN_CHUNKS: Duration = Duration::from_secs(1);

/// Default number of whole-chunk retries after a chunk-level failure.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between whole-chunk retry attempts.
/// 2 seconds is long enough for transient remote hiccups to clear.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Chunk size below the minimum of 1
    #[error("invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),

    /// Inconsistent adaptive chunk-size bounds
    #[error("invalid chunk bounds: min {min}, max {max} (need 1 <= min <= max)")]
    InvalidChunkBounds {
        /// Configured lower bound
        min: usize,
        /// Configured upper bound
        max: usize,
    },
}

/// Configuration for [`ChunkDispatcher`](super::ChunkDispatcher).
///
/// Immutable after construction. Invalid values fail construction with a
/// [`ConfigError`], never at call time.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Number of items processed concurrently per chunk (>= 1).
    pub chunk_size: usize,
    /// Pause inserted after every chunk except the last.
    pub delay_between_chunks: Duration,
    /// Whole-chunk retries after a chunk-level failure.
    pub max_retries: u32,
    /// Pause between whole-chunk retry attempts.
    pub retry_delay: Duration,
    /// Abort a chunk attempt on its first item failure instead of recording
    /// failures per item.
    pub fail_fast: bool,
}

impl ChunkConfig {
    /// Create a validated configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidChunkSize`] when `chunk_size < 1`.
    /// Delay and retry values are unsigned types, so the non-negativity
    /// checks hold by construction; user-facing layers that parse fractional
    /// seconds reject negative input before reaching here.
    pub fn new(
        chunk_size: usize,
        delay_between_chunks: Duration,
        max_retries: u32,
        retry_delay: Duration,
        fail_fast: bool,
    ) -> Result<Self, ConfigError> {
        if chunk_size < 1 {
            return Err(ConfigError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            chunk_size,
            delay_between_chunks,
            max_retries,
            retry_delay,
            fail_fast,
        })
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            delay_between_chunks: DEFAULT_DELAY_BETWEEN_CHUNKS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            fail_fast: false,
        }
    }
}
