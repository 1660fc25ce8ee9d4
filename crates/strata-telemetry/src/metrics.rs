//! Prometheus metrics for Strata clients.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `strata_calls_total` | Counter | `operation`, `outcome` | Completed calls |
//! | `strata_call_duration_seconds` | Histogram | `operation` | Call wall time |
//! | `strata_attempts_total` | Counter | `operation` | Attempts sent |
//! | `strata_retries_total` | Counter | `operation`, `kind` | Retries |
//! | `strata_in_flight_calls` | Gauge | `operation` | Calls in flight |
//!
//! `outcome` is `success` or the error kind code (`TRANSPORT_ERROR`,
//! `SERVICE_ERROR`, `RETRY_EXHAUSTED`, ...).
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_telemetry::metrics::{record_call, InFlightGuard};
//!
//! let _guard = InFlightGuard::new("DetachUserPolicy");
//! record_call("DetachUserPolicy", "success", Duration::from_millis(45));
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Calls completed.
pub const CALLS_TOTAL: &str = "strata_calls_total";
/// Call wall time.
pub const CALL_DURATION_SECONDS: &str = "strata_call_duration_seconds";
/// Attempts sent.
pub const ATTEMPTS_TOTAL: &str = "strata_attempts_total";
/// Retries scheduled.
pub const RETRIES_TOTAL: &str = "strata_retries_total";
/// Calls in flight.
pub const IN_FLIGHT_CALLS: &str = "strata_in_flight_calls";

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether to install a recorder.
    pub enabled: bool,

    /// Address to serve `/metrics` on (e.g., "0.0.0.0:9090"). Without one the
    /// recorder is installed in-process and read with [`render_metrics`].
    pub addr: Option<String>,

    /// Histogram buckets for call duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: None,
            duration_buckets: vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ],
        }
    }
}

/// Initializes the metrics subsystem.
///
/// With an `addr`, the Prometheus HTTP listener is spawned on the current
/// Tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparseable address and
/// `TelemetryError::MetricsInit` if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(CALL_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = match &config.addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
            let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
                TelemetryError::MetricsInit(format!("metrics listener needs a Tokio runtime: {e}"))
            })?;
            let (recorder, exporter) = builder
                .with_http_listener(addr)
                .build()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder)
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            runtime.spawn(exporter);
            handle
        }
        None => builder
            .install_recorder()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?,
    };

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(CALLS_TOTAL, "Total number of operation calls completed");
    describe_histogram!(
        CALL_DURATION_SECONDS,
        "Operation call duration in seconds, retries included"
    );
    describe_counter!(ATTEMPTS_TOTAL, "Total number of attempts sent");
    describe_counter!(RETRIES_TOTAL, "Total number of retries by classification");
    describe_gauge!(IN_FLIGHT_CALLS, "Number of operation calls in flight");
}

/// Records a completed call.
pub fn record_call(operation: &str, outcome: &str, duration: Duration) {
    counter!(
        CALLS_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(CALL_DURATION_SECONDS, "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

/// Records one attempt.
pub fn record_attempt(operation: &str) {
    counter!(ATTEMPTS_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Records a scheduled retry of the given classification.
pub fn record_retry(operation: &str, kind: &str) {
    counter!(
        RETRIES_TOTAL,
        "operation" => operation.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Guard that decrements the in-flight gauge on drop.
///
/// Use this to ensure the gauge is always decremented, even when the call
/// future is dropped mid-flight.
#[derive(Debug)]
pub struct InFlightGuard {
    operation: &'static str,
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        gauge!(IN_FLIGHT_CALLS, "operation" => operation).increment(1.0);
        Self { operation }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_CALLS, "operation" => self.operation).decrement(1.0);
    }
}
