//! # Strata Middleware
//!
//! The phased request pipeline that turns a typed operation input into a
//! signed, retried, observable HTTP exchange and back into a typed output or
//! a classified error.
//!
//! ## Phases
//!
//! ```text
//! input → Initialize → Serialize → Build → Finalize → Deserialize → output
//!                                            │   ▲
//!                                            ▼   │
//!                                          Transport
//! ```
//!
//! Every call passes through five fixed phases. Each phase holds an ordered
//! list of [`Step`]s; the order inside a phase is resolved once, when the
//! [`Stack`] is built, from [`Placement`] directives (`Front`, `Back`,
//! `Before(id)`, `After(id)`).
//!
//! | Phase       | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | Initialize  | Attach metadata, validate input                  |
//! | Serialize   | Typed input → request, resolve the endpoint      |
//! | Build       | Headers derived from the request                 |
//! | Finalize    | Retry, sign, send                                |
//! | Deserialize | Response → typed output or classified error      |
//!
//! ## Key Properties
//!
//! - **Immutable stacks**: a [`Stack`] is built once and shared by every call
//! - **Per-call state**: each call owns its [`InvocationContext`]
//! - **Retries re-drive Build**: the retry step rewinds the request and
//!   re-runs Build, Finalize and Deserialize; Serialize runs once
//! - **Cancellation**: checked at phase boundaries, before send and during
//!   backoff
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata_middleware::{defaults, CallContext, HmacSha256Signer, HyperTransport, Invoker};
//!
//! let common = defaults::common_steps(&config, Arc::new(HmacSha256Signer::new()), creds, bucket)?;
//! let stack = StackBuilder::assemble(operation, common, operation_steps)?;
//! let invoker = Invoker::new(Arc::new(stack), Arc::new(HyperTransport::new()));
//! let output = invoker.call::<Input, Output>(CallContext::new(), input).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/strata-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod defaults;
pub mod headers;
pub mod invoker;
pub mod phase;
pub mod protocol;
pub mod registry;
pub mod retry;
pub mod signer;
pub mod stack;
pub mod stages;
pub mod step;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use context::{CallContext, InvocationContext, ServiceMetadata};
pub use defaults::{common_steps, operation_steps, PipelineConfig};
pub use invoker::{Invoker, Output};
pub use phase::Phase;
pub use registry::{OrderingError, Placement, Relative, StageRegistry, StepRegistration};
pub use retry::{RetryConfig, RetryStep, TokenBucket};
pub use signer::{HmacSha256Signer, Signer, SigningParams};
pub use stack::{Stack, StackBuilder};
pub use step::{BoxFuture, FnStep, Next, Step};
pub use transport::{HyperTransport, Transport};
