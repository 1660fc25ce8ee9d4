//! # Strata
//!
//! A typed SDK client built on a phased request pipeline.
//!
//! Every call runs through the same five phases: Initialize, Serialize,
//! Build, Finalize and Deserialize. Along the way the input is validated,
//! serialized, signed, sent, retried on transient failure and decoded back
//! into a typed output or a classified [`SdkError`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_env().load()?;
//!
//!     let client = Client::builder()
//!         .config(config)
//!         .credentials(Credentials::new("AKID", "secret"))
//!         .build()?;
//!
//!     let output = client
//!         .invoke_with(
//!             DetachUserPolicy,
//!             DetachUserPolicyInput::new("alice", "arn:aws:iam::aws:policy/ReadOnlyAccess"),
//!             |opts| opts.max_attempts = Some(5),
//!         )
//!         .await?;
//!
//!     println!("attempts: {}", output.metadata.attempts());
//!     Ok(())
//! }
//! ```
//!
//! ## Crates
//!
//! | Crate               | Purpose                                      |
//! |---------------------|----------------------------------------------|
//! | `strata-core`       | Errors, operation descriptor, HTTP messages  |
//! | `strata-middleware` | Steps, stacks, retry, signing, transport     |
//! | `strata-config`     | Layered configuration                        |
//! | `strata-telemetry`  | Logging and metrics                          |

#![doc(html_root_url = "https://docs.rs/strata/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod operation;
pub mod operations;

pub use strata_config as config;
pub use strata_core as core;
pub use strata_middleware as middleware;
pub use strata_telemetry as telemetry;

pub use client::{Client, ClientBuilder};
pub use operation::{CallOptions, OperationSpec};

pub use strata_config::{ConfigLoader, StrataConfig};
pub use strata_core::{Credentials, ErrorKind, ResultMetadata, SdkError, SdkResult};
pub use strata_middleware::Output;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::operations::{DetachUserPolicy, DetachUserPolicyInput, DetachUserPolicyOutput};
    pub use crate::{
        CallOptions, Client, ClientBuilder, ConfigLoader, Credentials, ErrorKind, OperationSpec,
        Output, ResultMetadata, SdkError, SdkResult, StrataConfig,
    };
}
