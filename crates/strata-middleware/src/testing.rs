//! Fixtures for unit tests inside this crate.

use crate::context::{CallContext, InvocationContext};
use crate::phase::Phase;
use crate::protocol::Validate;
use crate::step::{BoxFuture, Chain, Next, Step};
use crate::transport::Transport;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use strata_core::{FieldErrors, HttpRequest, HttpResponse, Operation, SdkError, SdkResult, TypeErasedBox};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TestInput {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct TestOutput {
    pub value: String,
}

impl Validate for TestInput {
    fn validate(&self, errors: &mut FieldErrors) {
        match &self.name {
            None => errors.missing("Name"),
            Some(name) if name.is_empty() => errors.add("Name", "must not be empty"),
            Some(_) => {}
        }
    }
}

pub(crate) fn test_operation() -> Operation {
    Operation::new::<TestInput, TestOutput>("Test", "TestOperation", "test")
}

pub(crate) fn context_with(call: CallContext) -> InvocationContext {
    InvocationContext::new(
        test_operation(),
        call,
        TypeErasedBox::new(TestInput {
            name: Some("alice".to_string()),
        }),
    )
}

/// Builds a chain holding `steps` in `phase` and nothing else.
pub(crate) fn chain_of(phase: Phase, steps: Vec<Arc<dyn Step>>) -> Chain {
    let mut phases: [Vec<Arc<dyn Step>>; Phase::COUNT] = Default::default();
    phases[phase.index()] = steps;
    Chain::new(phases)
}

/// Runs a single step placed in `phase` through to the transport.
pub(crate) async fn run_phase(
    phase: Phase,
    step: impl Step,
    transport: &dyn Transport,
    ctx: &mut InvocationContext,
) -> SdkResult<()> {
    let chain = chain_of(phase, vec![Arc::new(step)]);
    Next::start(&chain, transport).run(ctx).await
}

/// Runs `chain` from the start.
pub(crate) async fn run_chain(
    chain: &Chain,
    transport: &dyn Transport,
    ctx: &mut InvocationContext,
) -> SdkResult<()> {
    Next::start(chain, transport).run(ctx).await
}

/// A request as the transport received it.
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Sent {
    fn capture(request: HttpRequest) -> Self {
        let (method, uri, headers, body) = request.into_parts();
        Self {
            method,
            uri,
            headers,
            body: body.into_bytes(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn ok_response() -> HttpResponse {
    HttpResponse::new(StatusCode::OK, HeaderMap::new(), r#"{"value":"ok"}"#)
}

/// Always answers with the same response.
pub(crate) struct StaticTransport {
    response: HttpResponse,
}

impl StaticTransport {
    pub fn ok() -> Self {
        Self::with(ok_response())
    }

    pub fn with(response: HttpResponse) -> Self {
        Self { response }
    }
}

impl Transport for StaticTransport {
    fn send<'a>(
        &'a self,
        _request: HttpRequest,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, SdkResult<HttpResponse>> {
        Box::pin(async move { Ok(self.response.clone()) })
    }
}

/// Plays back scripted outcomes, then a fallback, and records what it sent.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<SdkResult<HttpResponse>>>,
    fallback: SdkResult<HttpResponse>,
    sent: Mutex<Vec<Sent>>,
}

impl ScriptedTransport {
    /// Plays `script`, then answers 200.
    pub fn new(script: Vec<SdkResult<HttpResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Ok(ok_response()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing(err: SdkError) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(err),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sends(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn requests(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        request: HttpRequest,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, SdkResult<HttpResponse>> {
        self.sent.lock().push(Sent::capture(request));
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Box::pin(async move { outcome })
    }
}
