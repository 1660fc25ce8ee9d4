//! Response bookkeeping in the Deserialize phase.
//!
//! These steps run on the way back up from the transport:
//!
//! ```text
//! response_metadata      records status and server clock
//!   response_error       stamps request id and status onto errors
//!     deserializer       turns the response into output or error
//!       request_id       copies the request id into result metadata
//!         transport
//! ```

use crate::context::InvocationContext;
use crate::headers;
use crate::step::{BoxFuture, Next, Step};
use chrono::{DateTime, Utc};
use strata_core::{HttpResponse, SdkResult};

/// Returns the service request id carried by `response`, if any.
#[must_use]
pub fn request_id_of(response: &HttpResponse) -> Option<&str> {
    headers::REQUEST_ID
        .iter()
        .find_map(|name| response.header(name))
        .filter(|id| !id.is_empty())
}

/// Records the HTTP status and the server's `date` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseMetadataStep;

impl ResponseMetadataStep {
    /// Step id.
    pub const ID: &'static str = "response_metadata";
}

impl Step for ResponseMetadataStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let result = next.run(ctx).await;
            if let Some(response) = ctx.response() {
                let status = response.status().as_u16();
                let server_time = response
                    .header("date")
                    .and_then(|date| DateTime::parse_from_rfc2822(date).ok())
                    .map(|date| date.with_timezone(&Utc));

                let metadata = ctx.metadata_mut();
                metadata.set_http_status(status);
                if let Some(time) = server_time {
                    metadata.set_server_time(time);
                }
            }
            result
        })
    }
}

/// Stamps the request id and HTTP status onto errors that lack them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseErrorStep;

impl ResponseErrorStep {
    /// Step id.
    pub const ID: &'static str = "response_error";
}

impl Step for ResponseErrorStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let Err(mut err) = next.run(ctx).await else {
                return Ok(());
            };
            if let Some(response) = ctx.response() {
                if err.request_id().is_none() {
                    if let Some(id) = request_id_of(response) {
                        err = err.with_request_id(id);
                    }
                }
                if err.status().is_none() {
                    err = err.with_status(response.status().as_u16());
                }
            }
            Err(err)
        })
    }
}

/// Copies the service request id into the result metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdStep;

impl RequestIdStep {
    /// Step id.
    pub const ID: &'static str = "request_id";
}

impl Step for RequestIdStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            next.run(ctx).await?;
            let id = ctx.response().and_then(request_id_of).map(str::to_string);
            if let Some(id) = id {
                ctx.metadata_mut().set_request_id(id);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use crate::phase::Phase;
    use crate::step::{FnStep, Step};
    use crate::testing::{chain_of, context_with, run_chain, run_phase, StaticTransport};
    use chrono::TimeZone;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use std::sync::Arc;
    use strata_core::{ErrorKind, SdkError};

    fn response(status: StatusCode, pairs: &[(&'static str, &'static str)]) -> HttpResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        HttpResponse::new(status, headers, "")
    }

    fn noop_deserializer() -> Arc<dyn Step> {
        Arc::new(FnStep::new("deserializer", |_ctx: &mut InvocationContext| {
            Ok(())
        }))
    }

    #[test]
    fn test_request_id_lookup_order() {
        let r = response(
            StatusCode::OK,
            &[("x-request-id", "generic"), ("x-amz-request-id", "amz")],
        );
        assert_eq!(request_id_of(&r), Some("amz"));
        assert_eq!(request_id_of(&response(StatusCode::OK, &[])), None);
        assert_eq!(
            request_id_of(&response(StatusCode::OK, &[("x-amzn-requestid", "")])),
            None
        );
    }

    #[tokio::test]
    async fn test_metadata_records_status_and_server_time() {
        let transport = StaticTransport::with(response(
            StatusCode::ACCEPTED,
            &[("date", "Fri, 01 Mar 2024 12:30:00 GMT")],
        ));
        let mut ctx = context_with(CallContext::new());
        run_phase(Phase::Deserialize, ResponseMetadataStep, &transport, &mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.metadata().http_status(), Some(202));
        assert_eq!(
            ctx.metadata().server_time(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_request_id_recorded() {
        let transport =
            StaticTransport::with(response(StatusCode::OK, &[("x-amzn-requestid", "req-42")]));
        let mut ctx = context_with(CallContext::new());
        run_phase(Phase::Deserialize, RequestIdStep, &transport, &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.metadata().request_id(), Some("req-42"));
    }

    #[tokio::test]
    async fn test_error_gets_request_id_and_status() {
        let transport = StaticTransport::with(response(
            StatusCode::SERVICE_UNAVAILABLE,
            &[("x-amzn-requestid", "req-7")],
        ));
        let chain = chain_of(
            Phase::Deserialize,
            vec![Arc::new(ResponseErrorStep), Arc::new(FailAfter), noop_deserializer()],
        );
        let mut ctx = context_with(CallContext::new());
        let err = run_chain(&chain, &transport, &mut ctx).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.request_id(), Some("req-7"));
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_success_passes_through_error_step() {
        let mut ctx = context_with(CallContext::new());
        let chain = chain_of(
            Phase::Deserialize,
            vec![Arc::new(ResponseErrorStep), noop_deserializer()],
        );
        run_chain(&chain, &StaticTransport::ok(), &mut ctx)
            .await
            .unwrap();
    }

    /// Fails with an unannotated protocol error after the response arrives.
    struct FailAfter;

    impl Step for FailAfter {
        fn id(&self) -> &'static str {
            "fail_after"
        }

        fn handle<'a>(
            &'a self,
            ctx: &'a mut InvocationContext,
            next: Next<'a>,
        ) -> BoxFuture<'a, SdkResult<()>> {
            Box::pin(async move {
                next.run(ctx).await?;
                Err(SdkError::protocol("unreadable body"))
            })
        }
    }
}
