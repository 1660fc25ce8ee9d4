//! Request signing step.
//!
//! Placed in the Finalize phase after the retry step, so it runs once per
//! attempt and every attempt carries its own timestamp and signature.

use crate::context::InvocationContext;
use crate::signer::{Signer, SigningParams};
use crate::step::{BoxFuture, Next, Step};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use strata_core::{Credentials, SdkError, SdkResult};

/// Signs the finalized request with the client's credentials.
#[derive(Clone)]
pub struct SigningStep {
    signer: Arc<dyn Signer>,
    credentials: Credentials,
}

impl SigningStep {
    /// Step id.
    pub const ID: &'static str = "signing";

    /// Creates the step.
    #[must_use]
    pub fn new(signer: Arc<dyn Signer>, credentials: Credentials) -> Self {
        Self {
            signer,
            credentials,
        }
    }
}

impl fmt::Debug for SigningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningStep")
            .field("access_key_id", &self.credentials.access_key_id())
            .finish_non_exhaustive()
    }
}

impl Step for SigningStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let service = ctx.service_metadata().cloned().ok_or_else(|| {
                SdkError::assembly(format!(
                    "{}: service metadata missing at signing time",
                    ctx.operation().name()
                ))
            })?;
            let params = SigningParams {
                credentials: &self.credentials,
                signing_name: service.signing_name,
                region: &service.region,
                time: Utc::now(),
            };
            let request = ctx.require_request_mut(Self::ID)?;
            self.signer.sign(request, &params)?;
            next.run(ctx).await
        })
    }
}
