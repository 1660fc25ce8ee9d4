//! The default step set.
//!
//! [`common_steps`] returns the registrations every operation shares;
//! [`operation_steps`] returns the validator, serializer and deserializer
//! registrations for one operation, anchored on the common set.
//!
//! Resolved order:
//!
//! ```text
//! Initialize   invocation_logging -> operation_metadata -> operation_input_validation
//! Serialize    operation_serializer -> resolve_endpoint
//! Build        client_request_id -> user_agent -> content_length -> payload_hash
//! Finalize     retry -> signing
//! Deserialize  response_metadata -> response_error -> operation_deserializer
//!              -> request_id -> request_response_logging
//! ```

use crate::phase::Phase;
use crate::protocol::{
    DeserializeResponse, DeserializeStep, SerializeRequest, SerializeStep, Validate, ValidateStep,
};
use crate::registry::{Placement, StepRegistration};
use crate::retry::{RetryConfig, RetryStep, TokenBucket};
use crate::signer::Signer;
use crate::stages::{
    ClientRequestIdStep, ContentLengthStep, InvocationLoggingStep, OperationMetadataStep,
    PayloadHashStep, RequestIdStep, RequestResponseLoggingStep, ResolveEndpointStep,
    ResponseErrorStep, ResponseMetadataStep, SigningStep, UserAgentStep,
};
use std::sync::Arc;
use strata_core::{Credentials, SdkResult};

/// Client-level settings the common steps are built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    /// Default region; calls may override it.
    pub region: Option<String>,
    /// Base endpoint URL.
    pub endpoint: Option<String>,
    /// Application id appended to the user agent.
    pub app_id: Option<String>,
    /// Log every outgoing request at debug level.
    pub log_requests: bool,
    /// Log every raw response at debug level.
    pub log_responses: bool,
    /// Retry settings.
    pub retry: RetryConfig,
}

/// Returns the registrations shared by every operation.
///
/// # Errors
///
/// Returns an assembly error if the endpoint is not an absolute URL.
pub fn common_steps(
    config: &PipelineConfig,
    signer: Arc<dyn Signer>,
    credentials: Credentials,
    bucket: Arc<TokenBucket>,
) -> SdkResult<Vec<StepRegistration>> {
    use Phase::{Build, Deserialize, Finalize, Initialize, Serialize};
    use Placement::{After, Back};

    Ok(vec![
        StepRegistration::new(Initialize, Back, InvocationLoggingStep::new()),
        StepRegistration::new(
            Initialize,
            Back,
            OperationMetadataStep::new(config.region.clone()),
        ),
        StepRegistration::new(
            Serialize,
            Back,
            ResolveEndpointStep::new(config.endpoint.as_deref())?,
        ),
        StepRegistration::new(Build, Back, ClientRequestIdStep),
        StepRegistration::new(Build, Back, UserAgentStep::new(config.app_id.clone())),
        StepRegistration::new(Build, Back, ContentLengthStep),
        StepRegistration::new(Build, Back, PayloadHashStep),
        StepRegistration::new(Finalize, Back, RetryStep::new(config.retry.clone(), bucket)),
        StepRegistration::new(
            Finalize,
            After(RetryStep::ID),
            SigningStep::new(signer, credentials),
        ),
        StepRegistration::new(Deserialize, Back, ResponseMetadataStep),
        StepRegistration::new(Deserialize, Back, ResponseErrorStep),
        StepRegistration::new(Deserialize, Back, RequestIdStep),
        StepRegistration::new(
            Deserialize,
            Back,
            RequestResponseLoggingStep::new(config.log_requests, config.log_responses),
        ),
    ])
}

/// Returns the validator, serializer and deserializer registrations for
/// one operation.
pub fn operation_steps<S, D>(serializer: S, deserializer: D) -> Vec<StepRegistration>
where
    S: SerializeRequest,
    S::Input: Validate,
    D: DeserializeResponse,
{
    vec![
        StepRegistration::new(
            Phase::Initialize,
            Placement::After(OperationMetadataStep::ID),
            ValidateStep::<S::Input>::new(),
        ),
        StepRegistration::new(
            Phase::Serialize,
            Placement::Before(ResolveEndpointStep::ID),
            SerializeStep::new(serializer),
        ),
        StepRegistration::new(
            Phase::Deserialize,
            Placement::After(ResponseErrorStep::ID),
            DeserializeStep::new(deserializer),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use crate::invoker::Invoker;
    use crate::protocol::{FormQuerySerializer, JsonDeserializer};
    use crate::signer::HmacSha256Signer;
    use crate::stack::{Stack, StackBuilder};
    use crate::headers;
    use crate::testing::{test_operation, ScriptedTransport, TestInput, TestOutput};
    use http::{HeaderMap, HeaderValue, StatusCode};
    use std::time::Duration;
    use strata_core::{ErrorKind, HttpResponse, SdkError};

    fn config() -> PipelineConfig {
        PipelineConfig {
            region: Some("us-east-1".to_string()),
            endpoint: Some("https://test.example.com".to_string()),
            app_id: None,
            log_requests: true,
            log_responses: true,
            retry: RetryConfig {
                base_delay: Duration::from_millis(10),
                ..RetryConfig::default()
            },
        }
    }

    fn stack(config: &PipelineConfig) -> Stack {
        let common = common_steps(
            config,
            Arc::new(HmacSha256Signer::new()),
            Credentials::new("AKID", "secret"),
            Arc::new(TokenBucket::default()),
        )
        .unwrap();
        StackBuilder::assemble(
            test_operation(),
            common,
            operation_steps(
                FormQuerySerializer::<TestInput>::new("TestOperation", "v1"),
                JsonDeserializer::<TestOutput>::new(),
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_resolved_order() {
        let stack = stack(&config());
        assert_eq!(
            stack.ids(Phase::Initialize),
            vec!["invocation_logging", "operation_metadata", "operation_input_validation"]
        );
        assert_eq!(
            stack.ids(Phase::Serialize),
            vec!["operation_serializer", "resolve_endpoint"]
        );
        assert_eq!(
            stack.ids(Phase::Build),
            vec!["client_request_id", "user_agent", "content_length", "payload_hash"]
        );
        assert_eq!(stack.ids(Phase::Finalize), vec!["retry", "signing"]);
        assert_eq!(
            stack.ids(Phase::Deserialize),
            vec![
                "response_metadata",
                "response_error",
                "operation_deserializer",
                "request_id",
                "request_response_logging"
            ]
        );
    }

    #[test]
    fn test_invalid_endpoint_fails_assembly() {
        let config = PipelineConfig {
            endpoint: Some("not a url".to_string()),
            ..config()
        };
        let err = common_steps(
            &config,
            Arc::new(HmacSha256Signer::new()),
            Credentials::new("AKID", "secret"),
            Arc::new(TokenBucket::default()),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assembly);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_call_retries_and_resigns() {
        let mut response_headers = HeaderMap::new();
        response_headers.insert("x-amzn-requestid", HeaderValue::from_static("req-final"));
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(SdkError::transport("connection reset")),
            Ok(HttpResponse::new(StatusCode::OK, response_headers, r#"{"value":"done"}"#)),
        ]));
        let invoker = Invoker::new(Arc::new(stack(&config())), transport.clone());

        let output = invoker
            .call::<TestInput, TestOutput>(
                CallContext::new(),
                TestInput {
                    name: Some("alice".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(output.value.value, "done");
        assert_eq!(output.metadata.attempts(), 2);
        assert_eq!(output.metadata.request_id(), Some("req-final"));
        assert_eq!(output.metadata.http_status(), Some(200));

        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        for (i, request) in sent.iter().enumerate() {
            assert_eq!(request.uri.to_string(), "https://test.example.com/");
            assert_eq!(
                request.header(headers::ATTEMPT),
                Some(format!("attempt={}; max=3", i + 1).as_str())
            );
            assert!(request.header("authorization").is_some());
            assert_eq!(request.header("content-length"), Some("42"));
        }
        assert_eq!(
            sent[0].header(headers::INVOCATION_ID),
            sent[1].header(headers::INVOCATION_ID)
        );
        assert_eq!(
            sent[0].headers.get_all("authorization").iter().count(),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_required_field_never_sends() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let invoker = Invoker::new(Arc::new(stack(&config())), transport.clone());

        let err = invoker
            .call::<TestInput, TestOutput>(CallContext::new(), TestInput { name: None })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(transport.sends(), 0);
    }
}
