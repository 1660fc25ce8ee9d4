//! Operation metadata registration.
//!
//! Runs in the Initialize phase and records the facts later steps need:
//! service id, operation name, signing name and the region the call
//! targets. The region is the caller's per-call override when given,
//! otherwise the client default.

use crate::context::{InvocationContext, ServiceMetadata};
use crate::step::{BoxFuture, Next, Step};
use strata_core::{SdkError, SdkResult};

/// Attaches [`ServiceMetadata`] to the context.
#[derive(Debug, Clone)]
pub struct OperationMetadataStep {
    default_region: Option<String>,
}

impl OperationMetadataStep {
    /// Step id.
    pub const ID: &'static str = "operation_metadata";

    /// Creates the step with the client's default region.
    #[must_use]
    pub fn new(default_region: Option<String>) -> Self {
        Self { default_region }
    }
}

impl Step for OperationMetadataStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let region = ctx
                .call()
                .region()
                .map(ToString::to_string)
                .or_else(|| self.default_region.clone())
                .ok_or_else(|| {
                    SdkError::assembly(format!(
                        "{}: no region configured and none given for this call",
                        ctx.operation().name()
                    ))
                })?;

            let operation = ctx.operation();
            let metadata = ServiceMetadata {
                service_id: operation.service_id(),
                operation: operation.name(),
                signing_name: operation.signing_name(),
                region,
            };
            ctx.set_service_metadata(metadata);
            next.run(ctx).await
        })
    }
}
