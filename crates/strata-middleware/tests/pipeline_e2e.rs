//! End-to-end pipeline integration tests.
//!
//! These tests run whole calls through the default step set against a
//! scripted transport and check the behavior callers observe:
//!
//! 1. Retry budget - exactly N attempts, last error preserved
//! 2. Token bucket - throttling retries stop when the quota runs dry
//! 3. Cancellation - during backoff and during a send
//! 4. Replay - one-shot bodies are never silently resent
//! 5. Validation - invalid input never reaches the transport
//! 6. Ordering - placements resolve the same way every time

use http::{Method, Uri};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strata_core::{
    Credentials, ErrorKind, FieldErrors, HttpRequest, Operation, SdkBody, SdkError, SdkResult,
};
use strata_middleware::protocol::{FormQuerySerializer, JsonDeserializer, SerializeRequest, Validate};
use strata_middleware::{
    common_steps, headers, operation_steps, CallContext, FnStep, HmacSha256Signer, Invoker,
    InvocationContext, Phase, PipelineConfig, Placement, RetryConfig, Stack, StackBuilder,
    Step, StepRegistration, TokenBucket,
};
use strata_test::{ok_json, service_error, throttled, MockTransport, ResponseBuilder};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetWidgetInput {
    widget_id: Option<String>,
}

impl GetWidgetInput {
    fn new(id: &str) -> Self {
        Self {
            widget_id: Some(id.to_string()),
        }
    }
}

impl Validate for GetWidgetInput {
    fn validate(&self, errors: &mut FieldErrors) {
        if self.widget_id.is_none() {
            errors.missing("WidgetId");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct GetWidgetOutput {
    #[serde(default)]
    name: Option<String>,
}

fn operation() -> Operation {
    Operation::new::<GetWidgetInput, GetWidgetOutput>("Widgets", "GetWidget", "widgets")
}

/// Streams the form body once; it cannot be read a second time.
struct OneShotSerializer;

impl SerializeRequest for OneShotSerializer {
    type Input = GetWidgetInput;

    fn serialize(&self, input: &GetWidgetInput, request: &mut HttpRequest) -> SdkResult<()> {
        let body = FormQuerySerializer::<GetWidgetInput>::new("GetWidget", "2024-01-01").encode(input)?;
        request.set_method(Method::POST);
        request.set_uri(Uri::from_static("/"));
        request.set_body(SdkBody::once(body));
        Ok(())
    }
}

fn config(max_attempts: u32) -> PipelineConfig {
    PipelineConfig {
        region: Some("us-east-1".to_string()),
        endpoint: Some("https://widgets.example.com".to_string()),
        retry: RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(10),
            ..RetryConfig::default()
        },
        ..PipelineConfig::default()
    }
}

fn common(config: &PipelineConfig, bucket: Arc<TokenBucket>) -> Vec<StepRegistration> {
    common_steps(
        config,
        Arc::new(HmacSha256Signer::new()),
        Credentials::new("AKIDEXAMPLE", "secret"),
        bucket,
    )
    .unwrap()
}

fn stack_with(config: &PipelineConfig, bucket: Arc<TokenBucket>) -> Arc<Stack> {
    let stack = StackBuilder::assemble(
        operation(),
        common(config, bucket),
        operation_steps(
            FormQuerySerializer::<GetWidgetInput>::new("GetWidget", "2024-01-01"),
            JsonDeserializer::<GetWidgetOutput>::new(),
        ),
    )
    .unwrap();
    Arc::new(stack)
}

fn invoker(max_attempts: u32, transport: &Arc<MockTransport>) -> Invoker {
    let stack = stack_with(&config(max_attempts), Arc::new(TokenBucket::default()));
    Invoker::new(stack, transport.clone())
}

async fn get_widget(invoker: &Invoker, call: CallContext) -> SdkResult<GetWidgetOutput> {
    invoker
        .call::<GetWidgetInput, GetWidgetOutput>(call, GetWidgetInput::new("w-1"))
        .await
        .map(|output| output.into_inner())
}

// =============================================================================
// Retry budget
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_always_retryable_failure_makes_exactly_n_attempts() {
    let transport = Arc::new(MockTransport::always_failing(SdkError::transport(
        "connection reset",
    )));
    let invoker = invoker(4, &transport);

    let err = get_widget(&invoker, CallContext::new()).await.unwrap_err();

    assert_eq!(transport.sends(), 4);
    match &err {
        SdkError::RetryExhausted { attempts, source } => {
            assert_eq!(*attempts, 4);
            assert_eq!(source.kind(), ErrorKind::Transport);
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(err.root().kind(), ErrorKind::Transport);
}

#[tokio::test(start_paused = true)]
async fn test_transient_status_then_success() {
    let transport = Arc::new(
        MockTransport::new()
            .respond(service_error(503, "ServiceUnavailable", "try again"))
            .respond(
                ResponseBuilder::new(200)
                    .request_id("req-2")
                    .json(serde_json::json!({"name": "sprocket"}))
                    .build()
                    .unwrap(),
            ),
    );
    let invoker = invoker(3, &transport);

    let output = invoker
        .call::<GetWidgetInput, GetWidgetOutput>(CallContext::new(), GetWidgetInput::new("w-1"))
        .await
        .unwrap();

    assert_eq!(output.name.as_deref(), Some("sprocket"));
    assert_eq!(output.metadata.attempts(), 2);
    assert_eq!(output.metadata.request_id(), Some("req-2"));
    assert_eq!(output.metadata.attempt_latencies().len(), 2);

    let requests = transport.requests();
    assert_eq!(requests[0].header(headers::ATTEMPT), Some("attempt=1; max=3"));
    assert_eq!(requests[1].header(headers::ATTEMPT), Some("attempt=2; max=3"));
    assert_eq!(
        requests[0].header(headers::INVOCATION_ID),
        requests[1].header(headers::INVOCATION_ID)
    );
    assert_eq!(requests[1].body(), requests[0].body());
}

#[tokio::test(start_paused = true)]
async fn test_per_call_max_attempts_override() {
    let transport = Arc::new(MockTransport::always_failing(SdkError::transport("reset")));
    let invoker = invoker(3, &transport);

    let err = get_widget(&invoker, CallContext::new().with_max_attempts(5))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
    assert_eq!(transport.sends(), 5);
    assert_eq!(
        transport.last_request().unwrap().header(headers::ATTEMPT),
        Some("attempt=5; max=5")
    );
}

#[tokio::test]
async fn test_non_retryable_service_error_is_final() {
    let transport = Arc::new(
        MockTransport::new().respond(
            ResponseBuilder::new(404)
                .request_id("req-404")
                .json(serde_json::json!({"code": "NoSuchEntity", "message": "widget not found"}))
                .build()
                .unwrap(),
        ),
    );
    let invoker = invoker(3, &transport);

    let err = get_widget(&invoker, CallContext::new()).await.unwrap_err();

    assert_eq!(transport.sends(), 1);
    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(err.code(), "NoSuchEntity");
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.request_id(), Some("req-404"));
}

// =============================================================================
// Token bucket
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_empty_bucket_stops_throttling_retries() {
    let transport = Arc::new(MockTransport::always(throttled()));
    let bucket = Arc::new(TokenBucket::new(4));
    let invoker = Invoker::new(stack_with(&config(3), bucket.clone()), transport.clone());

    let err = get_widget(&invoker, CallContext::new()).await.unwrap_err();

    assert_eq!(transport.sends(), 1);
    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
    assert_eq!(err.root().status(), Some(429));
    assert_eq!(bucket.available(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_throttling_retry_spends_then_refunds_tokens() {
    let transport = Arc::new(
        MockTransport::new()
            .respond(throttled())
            .respond(ok_json(serde_json::json!({}))),
    );
    let bucket = Arc::new(TokenBucket::new(100));
    let invoker = Invoker::new(stack_with(&config(3), bucket.clone()), transport.clone());

    get_widget(&invoker, CallContext::new()).await.unwrap();

    assert_eq!(transport.sends(), 2);
    assert_eq!(bucket.available(), 100);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_returns_cancelled() {
    let transport = Arc::new(MockTransport::always(service_error(
        500,
        "InternalFailure",
        "boom",
    )));
    let mut config = config(3);
    config.retry.base_delay = Duration::from_secs(10);
    config.retry.jitter = 0.0;
    let invoker = Invoker::new(
        stack_with(&config, Arc::new(TokenBucket::default())),
        transport.clone(),
    );

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let err = get_widget(&invoker, CallContext::new().with_cancellation(token))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(transport.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_send() {
    let transport = Arc::new(MockTransport::new().hang());
    let invoker = invoker(3, &transport);

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = get_widget(&invoker, CallContext::new().with_cancellation(token))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(transport.sends(), 1);
}

// =============================================================================
// Replay
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_one_shot_body_is_not_resent() {
    let transport = Arc::new(MockTransport::always_failing(SdkError::transport("reset")));
    let stack = StackBuilder::assemble(
        operation(),
        common(&config(3), Arc::new(TokenBucket::default())),
        operation_steps(OneShotSerializer, JsonDeserializer::<GetWidgetOutput>::new()),
    )
    .unwrap();
    let invoker = Invoker::new(Arc::new(stack), transport.clone());

    let err = get_widget(&invoker, CallContext::new()).await.unwrap_err();

    assert!(
        matches!(err, SdkError::NonRetryableBody { attempt: 2 }),
        "unexpected error: {err:?}"
    );
    assert_eq!(transport.sends(), 1);
    assert_eq!(
        transport.request(0).unwrap().header(headers::CONTENT_SHA256),
        Some(headers::UNSIGNED_PAYLOAD)
    );
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_input_never_sends() {
    let transport = Arc::new(MockTransport::always(ok_json(serde_json::json!({}))));
    let invoker = invoker(3, &transport);

    let err = invoker
        .call::<GetWidgetInput, GetWidgetOutput>(
            CallContext::new(),
            GetWidgetInput { widget_id: None },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("WidgetId"));
    assert_eq!(transport.sends(), 0);
}

#[tokio::test]
async fn test_serializer_failure_never_sends() {
    let transport = Arc::new(MockTransport::always(ok_json(serde_json::json!({}))));
    let mut builder = StackBuilder::new(operation());
    for registration in common(&config(3), Arc::new(TokenBucket::default())) {
        builder.add(registration).unwrap();
    }
    builder
        .add(StepRegistration::new(
            Phase::Serialize,
            Placement::Before("resolve_endpoint"),
            FnStep::new("reject", |_ctx: &mut InvocationContext| -> SdkResult<()> {
                Err(SdkError::validation(
                    "GetWidget input is invalid",
                    FieldErrors::new(),
                ))
            }),
        ))
        .unwrap();
    let invoker = Invoker::new(Arc::new(builder.build().unwrap()), transport.clone());

    let err = get_widget(&invoker, CallContext::new()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(transport.sends(), 0);
}

// =============================================================================
// Ordering
// =============================================================================

fn noop(id: &'static str) -> impl Step {
    fn pass(_ctx: &mut InvocationContext) -> SdkResult<()> {
        Ok(())
    }
    FnStep::new(id, pass)
}

#[test]
fn test_front_after_before_resolves_c_a_b() {
    let mut builder = StackBuilder::new(operation());
    builder
        .add(StepRegistration::new(Phase::Build, Placement::Front, noop("a")))
        .unwrap()
        .add(StepRegistration::new(Phase::Build, Placement::After("a"), noop("b")))
        .unwrap()
        .add(StepRegistration::new(Phase::Build, Placement::Before("a"), noop("c")))
        .unwrap();

    let stack = builder.build().unwrap();
    assert_eq!(stack.ids(Phase::Build), vec!["c", "a", "b"]);
}

#[test]
fn test_custom_step_around_common_steps() {
    let mut builder = StackBuilder::new(operation());
    for registration in common(&config(3), Arc::new(TokenBucket::default())) {
        builder.add(registration).unwrap();
    }
    builder
        .add(StepRegistration::new(
            Phase::Finalize,
            Placement::Before("retry"),
            noop("audit"),
        ))
        .unwrap();

    let err = builder
        .add(StepRegistration::new(
            Phase::Finalize,
            Placement::After("missing"),
            noop("orphan"),
        ))
        .unwrap_err();
    assert!(err.to_string().contains("missing"));

    let stack = builder.build().unwrap();
    assert_eq!(stack.ids(Phase::Finalize), vec!["audit", "retry", "signing"]);
}

#[test]
fn test_stack_resolution_is_deterministic() {
    let first = stack_with(&config(3), Arc::new(TokenBucket::default())).describe();
    for _ in 0..10 {
        let again = stack_with(&config(3), Arc::new(TokenBucket::default())).describe();
        assert_eq!(again, first);
    }
}
