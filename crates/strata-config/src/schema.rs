//! Configuration schema types.
//!
//! Every field has a default, so a file only needs the keys it changes.
//! Unknown keys are rejected at every level.

use serde::{Deserialize, Serialize};
use strata_telemetry::LogFormat;

/// Client section.
///
/// # Example
///
/// ```
/// use strata_config::ClientConfig;
///
/// let config = ClientConfig {
///     region: Some("us-east-1".to_string()),
///     endpoint: Some("https://iam.amazonaws.com".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(config.request_timeout_ms, 30_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Default region for every call.
    pub region: Option<String>,

    /// Base endpoint URL (scheme, authority and optional base path).
    pub endpoint: Option<String>,

    /// Application id appended to the user agent.
    pub app_id: Option<String>,

    /// Per-attempt transport timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Log every outgoing request at debug level.
    pub log_requests: bool,

    /// Log every raw response at debug level.
    pub log_responses: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            app_id: None,
            request_timeout_ms: 30_000,
            log_requests: false,
            log_responses: false,
        }
    }
}

/// Retry strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// Classified retries with backoff and a shared token bucket.
    #[default]
    Standard,
    /// One attempt per call.
    Disabled,
}

/// Retry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Retry strategy.
    pub mode: RetryMode,

    /// Maximum attempts per call, including the first.
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds.
    pub base_delay_ms: u64,

    /// Cap on the exponential part of a backoff, in milliseconds. Jitter
    /// is added after the cap.
    pub max_backoff_ms: u64,

    /// Jitter fraction in `0.0..=1.0`. A delay can reach
    /// `max_backoff_ms * (1 + jitter)`.
    pub jitter: f64,

    /// Tokens the shared retry bucket starts with.
    pub token_bucket_capacity: u32,

    /// Tokens withdrawn for a throttling retry.
    pub retry_cost: u32,

    /// Tokens withdrawn for a timeout retry.
    pub timeout_retry_cost: u32,

    /// Tokens returned by a call that succeeds on its first attempt.
    pub success_refund: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            mode: RetryMode::Standard,
            max_attempts: 3,
            base_delay_ms: 100,
            max_backoff_ms: 20_000,
            jitter: 1.0,
            token_bucket_capacity: 500,
            retry_cost: 5,
            timeout_retry_cost: 10,
            success_refund: 1,
        }
    }
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging settings.
    pub logging: LoggingSection,

    /// Metrics settings.
    pub metrics: MetricsSection,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Install a subscriber at all.
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `strata_middleware=debug`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSection {
    /// Install a Prometheus recorder.
    pub enabled: bool,

    /// Listener address for `/metrics`; in-process only when unset.
    pub addr: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults() {
        let retry = RetrySettings::default();
        assert_eq!(retry.mode, RetryMode::Standard);
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.token_bucket_capacity, 500);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let retry: RetrySettings = toml::from_str("max_attempts = 5").unwrap();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay_ms, 100);
    }

    #[test]
    fn test_retry_mode_lowercase() {
        let retry: RetrySettings = toml::from_str(r#"mode = "disabled""#).unwrap();
        assert_eq!(retry.mode, RetryMode::Disabled);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ClientConfig, _> = toml::from_str(r#"regoin = "us-east-1""#);
        assert!(result.is_err());
    }
}
