//! Observability metrics for the dispatcher and limiter
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Prometheus exporter for the scrape endpoint (:9090/metrics by default)
//! - Emission points live inside the limiter/dispatcher/retry modules and
//!   degrade to no-ops when no recorder is installed, so library users who
//!   never call [`init_metrics`] pay nothing

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// This should be called once at application startup, typically in main().
/// The function is idempotent and will not reinitialize if already called.
///
/// # Arguments
/// * `addr` - Socket address to bind Prometheus scrape endpoint (e.g., "0.0.0.0:9090")
///
/// # Returns
/// Ok(()) if metrics initialized successfully, Err if binding fails
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "dispatch_items_total",
        Unit::Count,
        "Total items processed by the chunk dispatcher, labeled by outcome"
    );

    describe_counter!(
        "dispatch_batches_total",
        Unit::Count,
        "Total batch runs completed"
    );

    describe_counter!(
        "dispatch_chunk_retries_total",
        Unit::Count,
        "Total chunk-level retry attempts"
    );

    describe_histogram!(
        "dispatch_chunk_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of a single chunk dispatch in seconds"
    );

    describe_gauge!(
        "limiter_concurrency_limit",
        Unit::Count,
        "Current adaptive concurrency limit (fractional)"
    );

    describe_counter!(
        "limiter_throttle_total",
        Unit::Count,
        "Total multiplicative-decrease events triggered by errors"
    );

    describe_histogram!(
        "limiter_slot_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for an admission slot"
    );

    describe_histogram!(
        "retry_backoff_seconds",
        Unit::Seconds,
        "Duration of retry backoff delays in seconds"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Batch run metrics
pub struct BatchMetrics {
    label: String,
    start_time: tokio::time::Instant,
}

impl BatchMetrics {
    /// Start tracking a batch run
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();

        info!(batch = %label, "Batch dispatch started");

        Self {
            label,
            start_time: tokio::time::Instant::now(),
        }
    }

    /// Record a completed batch run
    pub fn record_complete(&self, successful: usize, failed: usize) {
        let duration = self.start_time.elapsed();

        counter!(
            "dispatch_batches_total",
            "batch" => self.label.clone(),
        )
        .increment(1);

        if failed > 0 {
            error!(
                batch = %self.label,
                successful = successful,
                failed = failed,
                duration_secs = duration.as_secs(),
                "Batch completed with failures"
            );
        } else {
            info!(
                batch = %self.label,
                successful = successful,
                duration_secs = duration.as_secs(),
                "Batch completed successfully"
            );
        }
    }
}
