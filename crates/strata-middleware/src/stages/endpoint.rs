//! Endpoint resolution.
//!
//! The serializer writes a relative path and query. This step, placed after
//! it in the Serialize phase, rebases that onto the configured endpoint:
//!
//! ```text
//! endpoint  https://iam.example.com/base
//! request   /?Action=DetachUserPolicy
//! result    https://iam.example.com/base/?Action=DetachUserPolicy
//! ```

use crate::context::InvocationContext;
use crate::step::{BoxFuture, Next, Step};
use http::uri::{Authority, Scheme};
use http::Uri;
use strata_core::{SdkError, SdkResult};

/// Applies the configured endpoint to the serialized request.
#[derive(Debug, Clone)]
pub struct ResolveEndpointStep {
    endpoint: Option<Endpoint>,
}

#[derive(Debug, Clone)]
struct Endpoint {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
}

impl ResolveEndpointStep {
    /// Step id.
    pub const ID: &'static str = "resolve_endpoint";

    /// Creates the step from an endpoint URL.
    ///
    /// With no endpoint the step fails every call with an assembly error
    /// before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns an assembly error if `endpoint` is not an absolute URL.
    pub fn new(endpoint: Option<&str>) -> SdkResult<Self> {
        let endpoint = endpoint.map(parse_endpoint).transpose()?;
        Ok(Self { endpoint })
    }
}

fn parse_endpoint(raw: &str) -> SdkResult<Endpoint> {
    let uri: Uri = raw
        .parse()
        .map_err(|e| SdkError::assembly(format!("invalid endpoint {raw:?}: {e}")))?;
    let parts = uri.into_parts();
    let (Some(scheme), Some(authority)) = (parts.scheme, parts.authority) else {
        return Err(SdkError::assembly(format!(
            "endpoint {raw:?} must include a scheme and host"
        )));
    };
    let base_path = parts
        .path_and_query
        .map(|pq| pq.path().trim_end_matches('/').to_string())
        .unwrap_or_default();
    Ok(Endpoint {
        scheme,
        authority,
        base_path,
    })
}

impl Step for ResolveEndpointStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let endpoint = self.endpoint.as_ref().ok_or_else(|| {
                SdkError::assembly(format!(
                    "{}: no endpoint configured",
                    ctx.operation().name()
                ))
            })?;

            let request = ctx.require_request_mut(Self::ID)?;
            let relative = request
                .uri()
                .path_and_query()
                .map_or("/", |pq| pq.as_str());
            let relative = if relative.starts_with('/') {
                relative.to_string()
            } else {
                format!("/{relative}")
            };

            let uri = Uri::builder()
                .scheme(endpoint.scheme.clone())
                .authority(endpoint.authority.clone())
                .path_and_query(format!("{}{relative}", endpoint.base_path))
                .build()
                .map_err(|e| SdkError::assembly(format!("cannot build request URI: {e}")))?;
            request.set_uri(uri);

            next.run(ctx).await
        })
    }
}
