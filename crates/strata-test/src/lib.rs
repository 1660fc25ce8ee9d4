//! # Strata Test
//!
//! Test utilities for Strata SDK clients. Calls run through the real
//! pipeline against a scripted in-memory transport, with no network.
//!
//! ## Key Features
//!
//! - **Scripted Outcomes**: responses, failures, delays and hangs, in order
//! - **Request Capture**: every attempt as the transport saw it
//! - **Response Fixtures**: JSON success and service-error documents
//!
//! ## Example
//!
//! ```ignore
//! use strata_test::{ok_empty, throttled, MockTransport};
//!
//! #[tokio::test]
//! async fn retries_throttling() {
//!     let transport = Arc::new(MockTransport::new().respond(throttled()).respond(ok_empty()));
//!     let client = Client::builder().transport(transport.clone()).build()?;
//!
//!     client.detach_user_policy(input).await?;
//!
//!     assert_eq!(transport.sends(), 2);
//!     assert_eq!(
//!         transport.request(1)?.header("x-strata-attempt"),
//!         Some("attempt=2; max=3")
//!     );
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod request;
mod response;
mod transport;

pub use error::TestError;
pub use request::CapturedRequest;
pub use response::{ok_empty, ok_json, service_error, throttled, ResponseBuilder};
pub use transport::{MockTransport, Outcome};
