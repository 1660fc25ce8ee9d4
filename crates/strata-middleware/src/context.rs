//! Per-call context types.
//!
//! [`CallContext`] is what the caller hands in: a cancellation token and
//! per-call overrides. [`InvocationContext`] is the mutable state that flows
//! through every step of one call. It owns the erased input, the protocol
//! request being built, the raw response, the erased output and the
//! [`ResultMetadata`] that is returned to the caller.

use crate::phase::Phase;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use strata_core::{
    HttpRequest, HttpResponse, InvocationId, Operation, ResultMetadata, SdkError, SdkResult,
    TypeErasedBox,
};
use tokio_util::sync::CancellationToken;

/// Caller-supplied options for a single call.
///
/// # Example
///
/// ```
/// use strata_middleware::context::CallContext;
///
/// let call = CallContext::new().with_region("eu-west-1").with_max_attempts(5);
/// assert_eq!(call.region(), Some("eu-west-1"));
/// assert_eq!(call.max_attempts(), Some(5));
/// ```
#[derive(Debug, Clone)]
pub struct CallContext {
    cancellation: CancellationToken,
    region: Option<String>,
    max_attempts: Option<u32>,
}

impl CallContext {
    /// Creates a call context with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            region: None,
            max_attempts: None,
        }
    }

    /// Uses the given cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Overrides the region for this call.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Overrides the maximum number of attempts for this call.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns the region override.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Returns the max attempts override.
    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Service facts attached during the Initialize phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMetadata {
    /// Service identifier.
    pub service_id: &'static str,
    /// Operation name.
    pub operation: &'static str,
    /// Name used when signing.
    pub signing_name: &'static str,
    /// Region the call targets.
    pub region: String,
}

/// Mutable state for one operation call.
///
/// Created by the [`Invoker`](crate::Invoker) for each call and dropped when
/// the call returns. Nothing in it is shared between calls.
pub struct InvocationContext {
    operation: Operation,
    call: CallContext,
    phase: Option<Phase>,
    service: Option<ServiceMetadata>,

    input: Option<TypeErasedBox>,
    request: Option<HttpRequest>,
    checkpoint: Option<HttpRequest>,
    response: Option<HttpResponse>,
    output: Option<TypeErasedBox>,

    metadata: ResultMetadata,
    attempt: u32,
    max_attempts: u32,
    in_attempt: bool,
    transmissions: u32,
    started_at: Instant,

    /// Type-erased extension data.
    ///
    /// Steps can store arbitrary data here using type-safe keys.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl InvocationContext {
    /// Creates a context for a call to `operation` with the given input.
    #[must_use]
    pub fn new(operation: Operation, call: CallContext, input: TypeErasedBox) -> Self {
        let invocation_id = InvocationId::new();
        let metadata = ResultMetadata::new(invocation_id, operation.name());
        Self {
            operation,
            call,
            phase: None,
            service: None,
            input: Some(input),
            request: None,
            checkpoint: None,
            response: None,
            output: None,
            metadata,
            attempt: 0,
            max_attempts: 0,
            in_attempt: false,
            transmissions: 0,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the operation descriptor.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Returns the invocation id shared by every attempt of this call.
    #[must_use]
    pub fn invocation_id(&self) -> InvocationId {
        self.metadata.invocation_id()
    }

    /// Returns the caller's options.
    #[must_use]
    pub fn call(&self) -> &CallContext {
        &self.call
    }

    /// Returns the cancellation token for this call.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.call.cancellation
    }

    /// Returns `true` if the caller cancelled the call.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.call.cancellation.is_cancelled()
    }

    /// Returns a cancellation error if the caller cancelled the call.
    pub fn check_cancelled(&self, when: &str) -> SdkResult<()> {
        if self.is_cancelled() {
            return Err(SdkError::cancelled(format!("call cancelled {when}")));
        }
        Ok(())
    }

    /// Returns the phase currently executing.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Crosses into `phase`.
    ///
    /// Cancellation is observed here. Entering Serialize creates an empty
    /// request for the serializer to fill. Entering Build for the first time
    /// saves a checkpoint of the serialized request so retries can rewind.
    pub(crate) fn enter_phase(&mut self, phase: Phase) -> SdkResult<()> {
        self.check_cancelled(&format!("before {phase} phase"))?;
        self.phase = Some(phase);
        match phase {
            Phase::Serialize if self.request.is_none() => {
                self.request = Some(HttpRequest::new());
            }
            Phase::Build if !self.in_attempt => {
                self.checkpoint = self.request.as_ref().and_then(HttpRequest::try_clone);
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns the service metadata, once the Initialize phase attached it.
    #[must_use]
    pub fn service_metadata(&self) -> Option<&ServiceMetadata> {
        self.service.as_ref()
    }

    /// Attaches service metadata.
    pub fn set_service_metadata(&mut self, service: ServiceMetadata) {
        self.service = Some(service);
    }

    /// Borrows the input as a `T`.
    ///
    /// # Errors
    ///
    /// Returns an assembly error if the input is missing or is not a `T`.
    pub fn input<T: 'static>(&self) -> SdkResult<&T> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| SdkError::assembly("operation input missing"))?;
        input.downcast_ref::<T>().ok_or_else(|| {
            SdkError::assembly(format!(
                "input type mismatch: expected {}, found {}",
                std::any::type_name::<T>(),
                input.type_name()
            ))
        })
    }

    /// Borrows the input as a `T` together with the request being built.
    ///
    /// # Errors
    ///
    /// Returns an assembly error if either is missing or the input is not a `T`.
    pub fn input_and_request_mut<T: 'static>(&mut self) -> SdkResult<(&T, &mut HttpRequest)> {
        let Self { input, request, .. } = self;
        let input = input
            .as_ref()
            .ok_or_else(|| SdkError::assembly("operation input missing"))?;
        let type_name = input.type_name();
        let input = input.downcast_ref::<T>().ok_or_else(|| {
            SdkError::assembly(format!(
                "input type mismatch: expected {}, found {type_name}",
                std::any::type_name::<T>()
            ))
        })?;
        let request = request
            .as_mut()
            .ok_or_else(|| SdkError::assembly("no request in flight"))?;
        Ok((input, request))
    }

    /// Returns the request being built.
    #[must_use]
    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    /// Returns the request being built, mutably.
    pub fn request_mut(&mut self) -> Option<&mut HttpRequest> {
        self.request.as_mut()
    }

    /// Returns the request being built, or an assembly error naming `step`.
    pub fn require_request_mut(&mut self, step: &str) -> SdkResult<&mut HttpRequest> {
        self.request
            .as_mut()
            .ok_or_else(|| SdkError::assembly(format!("{step}: no request in flight")))
    }

    /// Replaces the request being built.
    pub fn set_request(&mut self, request: HttpRequest) {
        self.request = Some(request);
    }

    /// Takes the request out of the context.
    pub fn take_request(&mut self) -> Option<HttpRequest> {
        self.request.take()
    }

    /// Returns `true` if a replayable checkpoint exists.
    #[must_use]
    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint.is_some()
    }

    /// Restores the request saved when the Build phase was first entered and
    /// clears any response or output from the previous attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::NonRetryableBody`] if the body cannot be replayed.
    pub fn rewind(&mut self) -> SdkResult<()> {
        let request = self
            .checkpoint
            .as_ref()
            .and_then(HttpRequest::try_clone)
            .ok_or(SdkError::NonRetryableBody {
                attempt: self.attempt,
            })?;
        self.request = Some(request);
        self.response = None;
        self.output = None;
        Ok(())
    }

    /// Returns the raw response of the current attempt.
    #[must_use]
    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    /// Records the raw response.
    pub fn set_response(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    /// Records the typed output.
    pub fn set_output(&mut self, output: TypeErasedBox) {
        self.output = Some(output);
    }

    /// Returns `true` if an output has been produced.
    #[must_use]
    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Takes the typed output.
    pub fn take_output(&mut self) -> Option<TypeErasedBox> {
        self.output.take()
    }

    /// Returns the result metadata collected so far.
    #[must_use]
    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    /// Returns the result metadata, mutably.
    pub fn metadata_mut(&mut self) -> &mut ResultMetadata {
        &mut self.metadata
    }

    /// Stamps the final duration and attempt count and returns the metadata.
    #[must_use]
    pub fn into_metadata(mut self) -> ResultMetadata {
        self.finish();
        self.metadata
    }

    pub(crate) fn finish(&mut self) {
        self.metadata.set_duration(self.started_at.elapsed());
        if self.metadata.attempts() == 0 {
            self.metadata.set_attempts(self.attempt.max(self.transmissions));
        }
    }

    /// Returns the current attempt number, starting at 1. Zero before the
    /// first attempt.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the attempt budget for this call. Zero before the first attempt.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns `true` while an attempt driven by the retry step is running.
    #[must_use]
    pub fn in_attempt(&self) -> bool {
        self.in_attempt
    }

    pub(crate) fn begin_attempt(&mut self, attempt: u32, max_attempts: u32) {
        self.attempt = attempt;
        self.max_attempts = max_attempts;
        self.in_attempt = true;
    }

    pub(crate) fn end_attempt(&mut self, latency: Duration) {
        self.in_attempt = false;
        self.metadata.push_attempt_latency(latency);
    }

    /// Returns how many times a request was handed to the transport.
    #[must_use]
    pub fn transmissions(&self) -> u32 {
        self.transmissions
    }

    pub(crate) fn record_transmission(&mut self) {
        self.transmissions += 1;
    }

    /// Returns the time elapsed since the call started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Inserts an extension value.
    ///
    /// Extensions allow steps to store arbitrary typed data.
    pub fn insert_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Gets a reference to an extension value.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Gets a mutable reference to an extension value.
    pub fn extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Removes an extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("operation", &self.operation.name())
            .field("invocation_id", &self.invocation_id())
            .field("phase", &self.phase)
            .field("attempt", &self.attempt)
            .field("transmissions", &self.transmissions)
            .finish_non_exhaustive()
    }
}
