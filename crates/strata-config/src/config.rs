//! Top-level configuration type.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_middleware::{PipelineConfig, RetryConfig};
use strata_telemetry::{LogConfig, LogFormat, MetricsConfig, TelemetryConfig};

use crate::{ClientConfig, ConfigError, RetryMode, RetrySettings, TelemetrySection};

/// Complete Strata client configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use strata_config::StrataConfig;
///
/// let config = StrataConfig::default();
/// assert_eq!(config.retry.max_attempts, 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct StrataConfig {
    /// Client settings.
    pub client: ClientConfig,

    /// Retry settings.
    pub retry: RetrySettings,

    /// Logging and metrics.
    pub telemetry: TelemetrySection,
}

impl StrataConfig {
    /// Development preset: pretty debug logs, metrics off.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.client.log_requests = true;
        config.client.log_responses = true;
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config
    }

    /// Production preset: JSON logs at info, in-process metrics.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.metrics.enabled = true;
        config
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "client.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if let Some(endpoint) = &self.client.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::invalid_value(
                    "client.endpoint",
                    format!("expected an http(s) URL: {endpoint}"),
                ));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }

        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::invalid_value(
                "retry.jitter",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::invalid_value(
                "retry.base_delay_ms",
                "must not exceed retry.max_backoff_ms",
            ));
        }

        if self.telemetry.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                "must not be empty",
            ));
        }

        if let Some(addr) = &self.telemetry.metrics.addr {
            if addr.parse::<SocketAddr>().is_err() {
                return Err(ConfigError::invalid_value(
                    "telemetry.metrics.addr",
                    format!("invalid socket address: {addr}"),
                ));
            }
        }

        Ok(())
    }

    /// Per-attempt transport timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.client.request_timeout_ms)
    }

    /// Retry policy for the pipeline. `disabled` mode allows one attempt.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        let retry = &self.retry;
        let max_attempts = match retry.mode {
            RetryMode::Standard => retry.max_attempts,
            RetryMode::Disabled => 1,
        };
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_backoff: Duration::from_millis(retry.max_backoff_ms),
            jitter: retry.jitter,
            retry_cost: retry.retry_cost,
            timeout_retry_cost: retry.timeout_retry_cost,
            success_refund: retry.success_refund,
        }
    }

    /// Settings the common pipeline steps are built from.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            region: self.client.region.clone(),
            endpoint: self.client.endpoint.clone(),
            app_id: self.client.app_id.clone(),
            log_requests: self.client.log_requests,
            log_responses: self.client.log_responses,
            retry: self.retry_config(),
        }
    }

    /// Telemetry settings for [`strata_telemetry::init_telemetry`].
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let logging = &self.telemetry.logging;
        let base = match logging.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        TelemetryConfig {
            logging: LogConfig {
                enabled: logging.enabled,
                level: logging.level.clone(),
                format: logging.format,
                ..base
            },
            metrics: MetricsConfig {
                enabled: self.telemetry.metrics.enabled,
                addr: self.telemetry.metrics.addr.clone(),
                ..MetricsConfig::default()
            },
        }
    }
}
