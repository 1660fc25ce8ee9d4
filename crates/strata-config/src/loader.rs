//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, strings and environment variables.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;
use strata_telemetry::LogFormat;

use crate::{ConfigError, RetryMode, StrataConfig};

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "STRATA";

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values or a preset
/// 2. Configuration files and strings (TOML or JSON), in call order
/// 3. Environment variables
///
/// Files and strings are merged key by key, so a file that only sets
/// `retry.max_attempts` keeps every other value from the layer below.
///
/// # Example
///
/// ```no_run
/// use strata_config::ConfigLoader;
///
/// # fn main() -> Result<(), strata_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_production()
///     .with_file("strata.toml")?
///     .with_env()
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: StrataConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: StrataConfig::default(),
            env_prefix: None,
        }
    }

    /// Reset to default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = StrataConfig::default();
        self
    }

    /// Start with the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use strata_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = StrataConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = StrataConfig::production();
        self
    }

    /// Merge a configuration file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some(format @ ("toml" | "json")) => self.with_string(&content, format),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    /// Merge a configuration file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merge configuration from a string.
    ///
    /// # Arguments
    ///
    /// * `content` - Configuration content as a string
    /// * `format` - `"toml"` or `"json"`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or a key is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use strata_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [client]
    ///     region = "us-west-2"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.client.region.as_deref(), Some("us-west-2"));
    /// assert_eq!(config.retry.max_attempts, 3);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let overlay: Value = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };

        self.merge(overlay)?;
        Ok(self)
    }

    /// Apply `STRATA__SECTION__KEY` environment overrides on load.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`.
    /// For example, with prefix "STRATA":
    /// - `STRATA__CLIENT__REGION=eu-central-1`
    /// - `STRATA__RETRY__MAX_ATTEMPTS=5`
    /// - `STRATA__TELEMETRY__LOGGING__FORMAT=pretty`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!(
                "failed to load .env: {e}"
            ))),
        }
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Environment variable parsing fails
    /// - Configuration validation fails
    pub fn load(mut self) -> Result<StrataConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> StrataConfig {
        self.config
    }

    fn merge(&mut self, overlay: Value) -> Result<(), ConfigError> {
        let mut base = serde_json::to_value(&self.config)?;
        merge_values(&mut base, overlay);
        self.config = serde_json::from_value(base)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut vars: Vec<(String, String)> =
            env::vars().filter(|(k, _)| k.starts_with(&marker)).collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            // Client section
            ["CLIENT", "REGION"] => config.client.region = optional(value),
            ["CLIENT", "ENDPOINT"] => config.client.endpoint = optional(value),
            ["CLIENT", "APP_ID"] => config.client.app_id = optional(value),
            ["CLIENT", "REQUEST_TIMEOUT_MS"] => {
                config.client.request_timeout_ms = parse_number(key, value)?;
            }
            ["CLIENT", "LOG_REQUESTS"] => config.client.log_requests = parse_flag(key, value)?,
            ["CLIENT", "LOG_RESPONSES"] => config.client.log_responses = parse_flag(key, value)?,

            // Retry section
            ["RETRY", "MODE"] => {
                config.retry.mode = match value.to_lowercase().as_str() {
                    "standard" => RetryMode::Standard,
                    "disabled" => RetryMode::Disabled,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'standard' or 'disabled'",
                        ))
                    }
                };
            }
            ["RETRY", "MAX_ATTEMPTS"] => config.retry.max_attempts = parse_number(key, value)?,
            ["RETRY", "BASE_DELAY_MS"] => config.retry.base_delay_ms = parse_number(key, value)?,
            ["RETRY", "MAX_BACKOFF_MS"] => {
                config.retry.max_backoff_ms = parse_number(key, value)?;
            }
            ["RETRY", "JITTER"] => {
                config.retry.jitter = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected float"))?;
            }
            ["RETRY", "TOKEN_BUCKET_CAPACITY"] => {
                config.retry.token_bucket_capacity = parse_number(key, value)?;
            }
            ["RETRY", "RETRY_COST"] => config.retry.retry_cost = parse_number(key, value)?,
            ["RETRY", "TIMEOUT_RETRY_COST"] => {
                config.retry.timeout_retry_cost = parse_number(key, value)?;
            }
            ["RETRY", "SUCCESS_REFUND"] => {
                config.retry.success_refund = parse_number(key, value)?;
            }

            // Telemetry logging
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            // Telemetry metrics
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = optional(value),

            _ => {
                return Err(ConfigError::env_parse_error(
                    key,
                    "unknown configuration key",
                ))
            }
        }

        Ok(())
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
