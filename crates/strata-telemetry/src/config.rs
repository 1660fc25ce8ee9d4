//! Telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Human-readable debug logs, metrics off.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            metrics: MetricsConfig::default(),
        }
    }

    /// JSON logs at info, metrics recorded in-process.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            metrics: MetricsConfig {
                enabled: true,
                ..MetricsConfig::default()
            },
        }
    }
}
