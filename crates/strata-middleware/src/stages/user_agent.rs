//! User agent.

use crate::context::InvocationContext;
use crate::step::{BoxFuture, Next, Step};
use http::header::USER_AGENT;
use http::HeaderValue;
use strata_core::{SdkError, SdkResult};

/// SDK name and version reported in the user agent.
pub const SDK_USER_AGENT: &str = concat!("strata/", env!("CARGO_PKG_VERSION"));

/// Sets `user-agent: strata/<version> <operation> [app/<id>]`.
#[derive(Debug, Clone, Default)]
pub struct UserAgentStep {
    app_id: Option<String>,
}

impl UserAgentStep {
    /// Step id.
    pub const ID: &'static str = "user_agent";

    /// Creates the step. `app_id` is appended when given.
    #[must_use]
    pub fn new(app_id: Option<String>) -> Self {
        Self { app_id }
    }

    /// Renders the user agent for `operation`.
    #[must_use]
    pub fn render(&self, operation: &str) -> String {
        match &self.app_id {
            Some(app) => format!("{SDK_USER_AGENT} {operation} app/{app}"),
            None => format!("{SDK_USER_AGENT} {operation}"),
        }
    }
}

impl Step for UserAgentStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            let agent = self.render(ctx.operation().name());
            let value = HeaderValue::from_str(&agent)
                .map_err(|_| SdkError::assembly(format!("invalid user agent: {agent:?}")))?;
            ctx.require_request_mut(Self::ID)?
                .set_header(USER_AGENT, value);
            next.run(ctx).await
        })
    }
}
