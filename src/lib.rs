//! # Adaptive Dispatcher Library
//!
//! A library for dispatching large numbers of latency-variable, rate-limited
//! remote operations (LLM calls, graph-database queries, any opaque async
//! call) without overwhelming the remote service, while tolerating partial
//! failure.
//!
//! ## Features
//!
//! - **Adaptive Admission Control**: AIMD-style concurrency limiter that
//!   tunes the number of in-flight operations from observed latency and
//!   errors
//! - **Chunked Batch Dispatch**: fan-out/fan-in over fixed-size or
//!   adaptively-sized chunks, with whole-chunk retry and running statistics
//! - **Bounded Retries**: exponential backoff around individual operations
//! - **Order Preservation**: results always come back in input order,
//!   regardless of completion order
//! - **Partial Failure Tolerance**: item failures are recorded per slot, not
//!   surfaced as batch-level errors
//!
//! ## Quick Start
//!
//! ```no_run
//! use adaptive_dispatcher::dispatcher::{ChunkConfig, ChunkDispatcher};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChunkConfig::new(
//!     10,                         // chunk size
//!     Duration::from_secs(1),     // delay between chunks
//!     3,                          // chunk retries
//!     Duration::from_secs(2),     // delay between chunk retries
//!     false,                      // fail fast
//! )?;
//!
//! let mut dispatcher = ChunkDispatcher::new(config);
//! let results = dispatcher
//!     .process_batch((0u64..100).collect(), |item| async move {
//!         // stand-in for a remote call
//!         Ok::<_, String>(item * 2)
//!     })
//!     .await;
//!
//! let stats = dispatcher.get_stats();
//! println!("{} succeeded, {} failed", stats.successful, stats.failed);
//! # let _ = results;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`limiter`] - AIMD admission control with a dynamic permit pool
//! - [`dispatcher`] - Chunked batch dispatch with retries and statistics
//! - [`retry`] - Bounded retries with exponential backoff
//! - [`metrics`] - Prometheus-exportable observability metrics
//! - [`shutdown`] - Graceful shutdown coordination for the CLI
//!
//! ## Concurrency Model
//!
//! Everything runs on a single cooperative event loop: "concurrent" means
//! many logical tasks interleaved, not parallel threads. Chunks are strictly
//! sequential; only items within a chunk run concurrently. The limiter is the
//! only component with state shared across tasks, and all of its mutation
//! happens inside one short critical section that is never held across an
//! `.await`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Chunked batch dispatch
pub mod dispatcher;

/// Adaptive admission-control limiter
pub mod limiter;

/// Observability metrics
pub mod metrics;

/// Bounded retries with exponential backoff
pub mod retry;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

// Re-export commonly used types
pub use dispatcher::{AdaptiveChunkProcessor, ChunkConfig, ChunkDispatcher, ChunkStats, ItemError};
pub use limiter::{AdaptiveLimiter, LimiterConfig, LimiterStats};
pub use retry::{retry_if, retry_with_backoff, RetryPolicy};
