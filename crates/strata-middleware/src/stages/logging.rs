//! Invocation logging.
//!
//! Two steps live here:
//!
//! - [`InvocationLoggingStep`] sits at the front of the Initialize phase. It
//!   opens the `strata.invoke` span that every later log line of the call is
//!   recorded under, tracks the in-flight gauge, and emits one completion
//!   record plus call metrics when the call returns.
//! - [`RequestResponseLoggingStep`] sits at the back of the Deserialize
//!   phase, closest to the transport. It logs each outgoing request and each
//!   raw response at debug level when enabled.
//!
//! # Log Fields
//!
//! - `operation` - Operation name
//! - `invocation_id` - Shared by every attempt of the call
//! - `attempts` - Attempts performed
//! - `request_id` - Service request id, when known
//! - `duration_ms` - Wall time of the call
//!
//! Header values that carry credentials are never logged.

use crate::context::InvocationContext;
use crate::headers;
use crate::step::{BoxFuture, Next, Step};
use http::HeaderMap;
use std::time::Instant;
use strata_core::SdkResult;
use strata_telemetry::metrics::{self, InFlightGuard};
use tracing::{debug, info, info_span, warn, Instrument};

const REDACTED: &str = "** redacted **";

/// Header names whose values are replaced with a placeholder in logs.
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", headers::SECURITY_TOKEN];

/// Opens the invocation span and records call-level logs and metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationLoggingStep;

impl InvocationLoggingStep {
    /// Step id.
    pub const ID: &'static str = "invocation_logging";

    /// Creates the step.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Step for InvocationLoggingStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let operation = ctx.operation().name();
            let span = info_span!(
                "strata.invoke",
                service = ctx.operation().service_id(),
                operation,
                invocation_id = %ctx.invocation_id(),
            );

            let _in_flight = InFlightGuard::new(operation);
            let started = Instant::now();
            let result = next.run(ctx).instrument(span.clone()).await;
            let elapsed = started.elapsed();
            let duration_ms = elapsed.as_secs_f64() * 1000.0;
            let attempts = ctx.metadata().attempts().max(ctx.attempt());

            span.in_scope(|| match &result {
                Ok(()) => {
                    info!(
                        operation,
                        attempts,
                        duration_ms,
                        request_id = ctx.metadata().request_id(),
                        "call succeeded"
                    );
                    metrics::record_call(operation, "success", elapsed);
                }
                Err(err) => {
                    warn!(
                        operation,
                        attempts,
                        duration_ms,
                        request_id = err.request_id(),
                        error_kind = err.kind().as_code(),
                        error_code = err.code(),
                        error = %err,
                        "call failed"
                    );
                    metrics::record_call(operation, err.kind().as_code(), elapsed);
                }
            });
            result
        })
    }
}

/// Logs each request sent and each raw response received.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestResponseLoggingStep {
    log_requests: bool,
    log_responses: bool,
}

impl RequestResponseLoggingStep {
    /// Step id.
    pub const ID: &'static str = "request_response_logging";

    /// Creates the step.
    #[must_use]
    pub const fn new(log_requests: bool, log_responses: bool) -> Self {
        Self {
            log_requests,
            log_responses,
        }
    }
}

impl Step for RequestResponseLoggingStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            if self.log_requests {
                if let Some(request) = ctx.request() {
                    debug!(
                        attempt = ctx.attempt(),
                        method = %request.method(),
                        uri = %request.uri(),
                        headers = ?redacted_headers(request.headers()),
                        body_len = request.body().content_length(),
                        "sending request"
                    );
                }
            }

            let result = next.run(ctx).await;

            if self.log_responses {
                if let Some(response) = ctx.response() {
                    debug!(
                        attempt = ctx.attempt(),
                        status = response.status().as_u16(),
                        headers = ?redacted_headers(response.headers()),
                        body_len = response.body().len(),
                        "received response"
                    );
                }
            }
            result
        })
    }
}

/// Renders headers for logging with credential values masked.
#[must_use]
pub fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}
