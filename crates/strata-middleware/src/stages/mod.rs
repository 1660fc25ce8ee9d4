//! Built-in pipeline steps.
//!
//! The default stack registers these steps in a fixed order:
//!
//! ## Initialize
//!
//! 1. [`logging::InvocationLoggingStep`] - Invocation span, call log and metrics
//! 2. [`operation_metadata::OperationMetadataStep`] - Service id, signing name, region
//!
//! ## Serialize
//!
//! 3. [`endpoint::ResolveEndpointStep`] - Rebases the serialized request onto the endpoint
//!
//! ## Build
//!
//! 4. [`client_request_id::ClientRequestIdStep`] - Invocation id header
//! 5. [`user_agent::UserAgentStep`] - User agent header
//! 6. [`content::ContentLengthStep`] - `content-length`
//! 7. [`content::PayloadHashStep`] - Payload hash header
//!
//! ## Finalize
//!
//! 8. [`crate::retry::RetryStep`] - Attempts, backoff and retry tokens
//! 9. [`signing::SigningStep`] - Per-attempt signature
//!
//! ## Deserialize
//!
//! 10. [`response::ResponseMetadataStep`] - Status and server clock
//! 11. [`response::ResponseErrorStep`] - Request id on errors
//! 12. [`response::RequestIdStep`] - Request id on success
//! 13. [`logging::RequestResponseLoggingStep`] - Wire-level debug logs
//!
//! Operation-specific serializer, validator and deserializer steps are added
//! around these by each operation.

pub mod client_request_id;
pub mod content;
pub mod endpoint;
pub mod logging;
pub mod operation_metadata;
pub mod response;
pub mod signing;
pub mod user_agent;

pub use client_request_id::ClientRequestIdStep;
pub use content::{ContentLengthStep, PayloadHashStep};
pub use endpoint::ResolveEndpointStep;
pub use logging::{InvocationLoggingStep, RequestResponseLoggingStep};
pub use operation_metadata::OperationMetadataStep;
pub use response::{RequestIdStep, ResponseErrorStep, ResponseMetadataStep};
pub use signing::SigningStep;
pub use user_agent::UserAgentStep;
