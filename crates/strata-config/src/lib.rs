//! Layered configuration for Strata SDK clients.
//!
//! Configuration is assembled in layers, later layers winning:
//!
//! 1. **Defaults** or a preset ([`StrataConfig::development`],
//!    [`StrataConfig::production`])
//! 2. **Files and strings** in TOML or JSON, merged key by key
//! 3. **Environment variables** in the form `STRATA__SECTION__KEY`
//!
//! Unknown keys are rejected at every layer. [`ConfigLoader::load`] validates
//! the result.
//!
//! # Example
//!
//! ```no_run
//! use strata_config::ConfigLoader;
//!
//! # fn main() -> Result<(), strata_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_production()
//!     .with_optional_file("strata.toml")?
//!     .with_dotenv()?
//!     .with_env()
//!     .load()?;
//!
//! let pipeline = config.pipeline_config();
//! let telemetry = config.telemetry_config();
//! # let _ = (pipeline, telemetry);
//! # Ok(())
//! # }
//! ```
//!
//! # File Format
//!
//! ```toml
//! [client]
//! region = "us-east-1"
//! endpoint = "https://iam.amazonaws.com"
//! app_id = "billing"
//! request_timeout_ms = 30000
//!
//! [retry]
//! mode = "standard"
//! max_attempts = 3
//! base_delay_ms = 100
//! max_backoff_ms = 20000
//! jitter = 1.0
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9464"
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::*;
pub use loader::*;
pub use schema::*;
pub use strata_telemetry::LogFormat;
