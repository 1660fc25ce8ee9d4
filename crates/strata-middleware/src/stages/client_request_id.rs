//! Client request id.
//!
//! Every call gets a UUID v7 invocation id when its context is created. This
//! step sends it as `x-strata-invocation-id` so the service can correlate
//! the attempts of one call. Because the Build phase is re-run on every
//! retry against the rewound request, the header is present on every
//! attempt with the same value.

use crate::context::InvocationContext;
use crate::headers;
use crate::step::{BoxFuture, Next, Step};
use http::{HeaderName, HeaderValue};
use strata_core::{SdkError, SdkResult};

/// Stamps the invocation id header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientRequestIdStep;

impl ClientRequestIdStep {
    /// Step id.
    pub const ID: &'static str = "client_request_id";
}

impl Step for ClientRequestIdStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let id = ctx.invocation_id().to_string();
            let value = HeaderValue::from_str(&id)
                .map_err(|e| SdkError::assembly(format!("invalid invocation id: {e}")))?;
            ctx.require_request_mut(Self::ID)?
                .set_header(HeaderName::from_static(headers::INVOCATION_ID), value);
            next.run(ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use crate::phase::Phase;
    use crate::testing::{context_with, run_phase, ScriptedTransport};

    #[tokio::test]
    async fn test_sets_invocation_id() {
        let transport = ScriptedTransport::new(vec![]);
        let mut ctx = context_with(CallContext::new());
        let expected = ctx.invocation_id().to_string();

        run_phase(Phase::Build, ClientRequestIdStep, &transport, &mut ctx)
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].header(headers::INVOCATION_ID), Some(expected.as_str()));
    }

    #[test]
    fn test_ids_differ_between_calls() {
        let a = context_with(CallContext::new()).invocation_id();
        let b = context_with(CallContext::new()).invocation_id();
        assert_ne!(a, b);
    }
}
