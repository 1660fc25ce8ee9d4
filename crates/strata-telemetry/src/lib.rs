//! Structured logging and metrics for Strata clients.
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, JSON or pretty output
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! The pipeline records metrics through the helpers in [`metrics`]. They are
//! no-ops until a recorder is installed, so libraries can call them freely
//! and applications decide whether to export.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `strata_calls_total` | Counter | `operation`, `outcome` | Completed calls |
//! | `strata_call_duration_seconds` | Histogram | `operation` | Call wall time, retries included |
//! | `strata_attempts_total` | Counter | `operation` | Attempts sent |
//! | `strata_retries_total` | Counter | `operation`, `kind` | Retries by classification |
//! | `strata_in_flight_calls` | Gauge | `operation` | Calls currently running |
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry(&TelemetryConfig::development()).expect("telemetry");
//!     tracing::info!("ready");
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_telemetry_is_noop() {
        let config = TelemetryConfig {
            logging: LogConfig {
                enabled: false,
                ..LogConfig::default()
            },
            metrics: MetricsConfig {
                enabled: false,
                ..MetricsConfig::default()
            },
        };
        init_telemetry(&config).unwrap();
    }
}
