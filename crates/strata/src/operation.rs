//! Operation bindings and per-call options.

use strata_core::Operation;
use strata_middleware::protocol::Validate;
use strata_middleware::{CallContext, StepRegistration};
use tokio_util::sync::CancellationToken;

/// Binds an operation's types and wire format to the pipeline.
///
/// Implementors are usually zero-sized markers; the [`Client`](crate::Client)
/// assembles one stack per implementor and caches it.
///
/// # Example
///
/// ```ignore
/// pub struct GetWidget;
///
/// impl OperationSpec for GetWidget {
///     type Input = GetWidgetInput;
///     type Output = GetWidgetOutput;
///
///     fn operation() -> Operation {
///         Operation::new::<GetWidgetInput, GetWidgetOutput>("Widgets", "GetWidget", "widgets")
///     }
///
///     fn steps() -> Vec<StepRegistration> {
///         operation_steps(
///             FormQuerySerializer::<GetWidgetInput>::new("GetWidget", "2024-01-01"),
///             JsonDeserializer::<GetWidgetOutput>::new(),
///         )
///     }
/// }
/// ```
pub trait OperationSpec: Send + Sync + 'static {
    /// Input type.
    type Input: Validate + Send + Sync + 'static;
    /// Output type.
    type Output: Send + Sync + 'static;

    /// The immutable operation descriptor.
    fn operation() -> Operation;

    /// Validator, serializer and deserializer registrations, anchored on the
    /// common steps.
    fn steps() -> Vec<StepRegistration>;
}

/// Overrides applied to a single call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Attempt budget for this call, including the first.
    pub max_attempts: Option<u32>,
    /// Region for this call.
    pub region: Option<String>,
    /// Token that cancels this call.
    pub cancellation: Option<CancellationToken>,
}

impl CallOptions {
    pub(crate) fn into_call_context(self) -> CallContext {
        let mut call = CallContext::new();
        if let Some(max_attempts) = self.max_attempts {
            call = call.with_max_attempts(max_attempts);
        }
        if let Some(region) = self.region {
            call = call.with_region(region);
        }
        if let Some(token) = self.cancellation {
            call = call.with_cancellation(token);
        }
        call
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_leave_call_untouched() {
        let call = CallOptions::default().into_call_context();
        assert!(call.max_attempts().is_none());
        assert!(call.region().is_none());
        assert!(!call.cancellation().is_cancelled());
    }

    #[test]
    fn test_overrides_carried_into_call() {
        let token = CancellationToken::new();
        let call = CallOptions {
            max_attempts: Some(1),
            region: Some("eu-west-1".to_string()),
            cancellation: Some(token.clone()),
        }
        .into_call_context();

        assert_eq!(call.max_attempts(), Some(1));
        assert_eq!(call.region(), Some("eu-west-1"));
        token.cancel();
        assert!(call.cancellation().is_cancelled());
    }
}
