//! Simulate command implementation
//!
//! Drives the full pipeline - adaptive limiter, chunked dispatcher, bounded
//! retries - against a synthetic workload with configurable latency and
//! failure characteristics. Useful for observing limiter adaptation under a
//! Prometheus scrape without touching a real remote service.

use crate::dispatcher::{ChunkConfig, ChunkDispatcher};
use crate::limiter::{AdaptiveLimiter, LimiterConfig};
use crate::metrics::BatchMetrics;
use crate::shutdown::SharedShutdown;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::CliError;

/// Maximum allowed concurrency to prevent self-inflicted rate limiting
const MAX_CONCURRENCY: usize = 32;

/// Parse a non-negative duration given as fractional seconds.
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number of seconds"))?;
    if !value.is_finite() {
        return Err(format!("'{s}' is not a finite number of seconds"));
    }
    if value < 0.0 {
        return Err("duration must not be negative".to_string());
    }
    if value > 86_400.0 {
        return Err("duration must be at most 86400 seconds".to_string());
    }
    Ok(Duration::from_secs_f64(value))
}

/// Parse and validate a concurrency value.
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Parse a probability in [0, 1].
fn parse_probability(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid probability"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("probability {value} must lie within [0, 1]"));
    }
    Ok(value)
}

/// Adaptive Dispatcher CLI
#[derive(Parser, Debug)]
#[command(name = "adaptive-dispatcher")]
#[command(about = "Adaptive concurrency limiting and chunked batch dispatch", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Prometheus scrape endpoint address (metrics stay disabled when unset)
    #[arg(long, global = true, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the limiter and dispatcher against a synthetic workload
    Simulate(SimulateArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Arguments for the simulate command
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of synthetic items in the batch
    #[arg(long, default_value_t = 100)]
    pub items: usize,

    /// Items dispatched concurrently per chunk
    #[arg(long, default_value_t = 10)]
    pub chunk_size: usize,

    /// Pause between consecutive chunks, in seconds (fractions allowed)
    #[arg(long, default_value = "1", value_parser = parse_seconds)]
    pub delay_between_chunks: Duration,

    /// Chunk-level retries after a fail-fast abort (default: 3, range: 0-20)
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Pause before each chunk retry, in seconds
    #[arg(long, default_value = "2", value_parser = parse_seconds)]
    pub retry_delay: Duration,

    /// Abort a chunk on its first item failure and retry the whole chunk
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    /// Concurrency limit the limiter starts with
    #[arg(long, default_value = "1", value_parser = parse_concurrency)]
    pub initial_concurrency: usize,

    /// Upper bound the limit can grow to (max: 32)
    #[arg(long, default_value = "10", value_parser = parse_concurrency)]
    pub max_concurrency: usize,

    /// Lower bound the limit can shrink to
    #[arg(long, default_value = "1", value_parser = parse_concurrency)]
    pub min_concurrency: usize,

    /// Latency target steering the limiter, in seconds
    #[arg(long, default_value = "2", value_parser = parse_seconds)]
    pub target_latency: Duration,

    /// Latency samples per adaptation window
    #[arg(long, default_value_t = 10)]
    pub window_size: usize,

    /// Mean simulated latency per item, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub mean_latency_ms: u64,

    /// Probability that a simulated call fails
    #[arg(long, default_value = "0.05", value_parser = parse_probability)]
    pub failure_rate: f64,

    /// Seed for the deterministic workload generator
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// SplitMix64 step. Deterministic and dependency-free; statistical quality
/// is irrelevant here, we only need a reproducible spread of latencies.
fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

impl SimulateArgs {
    /// Run the simulation, reporting stats in the requested output format.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let limiter = AdaptiveLimiter::new(LimiterConfig {
            initial_concurrency: self.initial_concurrency,
            max_concurrency: self.max_concurrency,
            min_concurrency: self.min_concurrency,
            target_latency: self.target_latency,
            window_size: self.window_size,
        })?;

        let config = ChunkConfig::new(
            self.chunk_size,
            self.delay_between_chunks,
            self.max_retries,
            self.retry_delay,
            self.fail_fast,
        )?;
        let mut dispatcher = ChunkDispatcher::new(config);

        info!(
            items = self.items,
            chunk_size = self.chunk_size,
            failure_rate = self.failure_rate,
            seed = self.seed,
            "Starting simulated batch"
        );

        let workload = Arc::new(Workload {
            seed: self.seed,
            mean_latency_ms: self.mean_latency_ms.max(1),
            failure_rate: self.failure_rate,
            calls: AtomicU64::new(0),
        });

        let batch_metrics = BatchMetrics::start("simulate");
        let items: Vec<u64> = (0..self.items as u64).collect();
        let process_fn = {
            let limiter = limiter.clone();
            let workload = Arc::clone(&workload);
            move |item: u64| {
                let limiter = limiter.clone();
                let workload = Arc::clone(&workload);
                async move { limiter.run(workload.call(item)).await }
            }
        };

        let results = tokio::select! {
            results = dispatcher.process_batch_with_progress(items, process_fn, |completed, total| {
                info!(completed, total, "Batch progress");
            }) => Some(results),
            _ = shutdown.wait() => {
                warn!("Simulation interrupted - reporting committed chunks only");
                None
            }
        };

        let failed_indices: Vec<usize> = results
            .iter()
            .flatten()
            .filter_map(|outcome| outcome.as_ref().err().map(|e| e.index()))
            .collect();

        // After an interrupt the stats cover only fully committed chunks;
        // the in-flight chunk is dropped without partial credit.
        let stats = dispatcher.get_stats();
        let limiter_stats = limiter.stats();
        batch_metrics.record_complete(stats.successful, stats.failed);

        match cli.output_format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "batch": stats,
                    "limiter": limiter_stats,
                    "failed_indices": failed_indices,
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            }
            OutputFormat::Human => {
                println!("{}", stats.format_summary());
                println!(
                    "Limiter: limit {:.1}, {} successes, {} throttle events, avg latency {:?}",
                    limiter_stats.concurrency,
                    limiter_stats.success_count,
                    limiter_stats.throttle_count,
                    limiter_stats.avg_latency,
                );
                if !failed_indices.is_empty() {
                    println!("Failed items: {failed_indices:?}");
                }
            }
        }

        Ok(())
    }
}

/// Deterministic synthetic remote service.
struct Workload {
    seed: u64,
    mean_latency_ms: u64,
    failure_rate: f64,
    /// Global call counter. Folding it into the hash makes retries of the
    /// same item draw fresh outcomes instead of failing forever.
    calls: AtomicU64,
}

impl Workload {
    async fn call(&self, item: u64) -> Result<u64, String> {
        let nonce = self.calls.fetch_add(1, Ordering::Relaxed);
        let draw = splitmix64(self.seed ^ item.wrapping_mul(0x2545f4914f6cdd1d) ^ (nonce << 32));

        // Latency spread over [mean/2, mean*1.5).
        let spread = draw % self.mean_latency_ms;
        let latency_ms = self.mean_latency_ms / 2 + spread;
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        let unit = (splitmix64(draw) >> 11) as f64 / (1u64 << 53) as f64;
        if unit < self.failure_rate {
            Err(format!("simulated failure on item {item}"))
        } else {
            Ok(item * 2)
        }
    }
}
