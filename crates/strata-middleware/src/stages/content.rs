//! Body-derived headers.
//!
//! [`ContentLengthStep`] sets `content-length` and [`PayloadHashStep`] sets
//! `x-strata-content-sha256`. A one-shot body cannot be read ahead of
//! sending, so it gets no length header and the unsigned-payload marker.

use crate::context::InvocationContext;
use crate::headers;
use crate::signer::payload_hash;
use crate::step::{BoxFuture, Next, Step};
use http::header::CONTENT_LENGTH;
use http::{HeaderName, HeaderValue};
use strata_core::{SdkError, SdkResult};

/// Sets `content-length` from a replayable body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentLengthStep;

impl ContentLengthStep {
    /// Step id.
    pub const ID: &'static str = "content_length";
}

impl Step for ContentLengthStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let request = ctx.require_request_mut(Self::ID)?;
            if let Some(length) = request.body().content_length() {
                request.set_header(CONTENT_LENGTH, HeaderValue::from(length));
            }
            next.run(ctx).await
        })
    }
}

/// Sets the payload hash header.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadHashStep;

impl PayloadHashStep {
    /// Step id.
    pub const ID: &'static str = "payload_hash";
}

impl Step for PayloadHashStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let request = ctx.require_request_mut(Self::ID)?;
            let hash = payload_hash(request);
            let value = HeaderValue::from_str(&hash)
                .map_err(|e| SdkError::assembly(format!("invalid payload hash: {e}")))?;
            request.set_header(HeaderName::from_static(headers::CONTENT_SHA256), value);
            next.run(ctx).await
        })
    }
}
