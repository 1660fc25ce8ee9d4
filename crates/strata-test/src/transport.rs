//! A scripted in-memory transport.

use crate::error::TestError;
use crate::request::CapturedRequest;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use strata_core::{HttpRequest, HttpResponse, SdkError, SdkResult};
use strata_middleware::{BoxFuture, Transport};
use tokio_util::sync::CancellationToken;

/// What the transport does with one request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Return this response immediately.
    Respond(HttpResponse),
    /// Fail with this error immediately.
    Fail(SdkError),
    /// Return this response after a delay, unless cancelled first.
    RespondAfter(Duration, HttpResponse),
    /// Never answer; resolves only when the call is cancelled.
    Hang,
}

/// Plays back scripted outcomes in order and records every request.
///
/// Once the script runs out, the fallback outcome is used; without one the
/// send fails with a transport error.
///
/// # Example
///
/// ```
/// use strata_core::SdkError;
/// use strata_test::{ok_empty, MockTransport};
///
/// let transport = MockTransport::new()
///     .fail(SdkError::transport("connection reset"))
///     .respond(ok_empty());
///
/// assert_eq!(transport.remaining(), 2);
/// assert_eq!(transport.sends(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Option<Outcome>,
    sent: Mutex<Vec<CapturedRequest>>,
}

impl MockTransport {
    /// Creates a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that answers every request with `response`.
    #[must_use]
    pub fn always(response: HttpResponse) -> Self {
        Self::new().otherwise(Outcome::Respond(response))
    }

    /// Creates a transport that fails every request with `err`.
    #[must_use]
    pub fn always_failing(err: SdkError) -> Self {
        Self::new().otherwise(Outcome::Fail(err))
    }

    /// Appends an outcome.
    #[must_use]
    pub fn then(self, outcome: Outcome) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    /// Appends a response.
    #[must_use]
    pub fn respond(self, response: HttpResponse) -> Self {
        self.then(Outcome::Respond(response))
    }

    /// Appends a failure.
    #[must_use]
    pub fn fail(self, err: SdkError) -> Self {
        self.then(Outcome::Fail(err))
    }

    /// Appends a delayed response.
    #[must_use]
    pub fn respond_after(self, delay: Duration, response: HttpResponse) -> Self {
        self.then(Outcome::RespondAfter(delay, response))
    }

    /// Appends a request that never completes.
    #[must_use]
    pub fn hang(self) -> Self {
        self.then(Outcome::Hang)
    }

    /// Sets the outcome used once the script is exhausted.
    #[must_use]
    pub fn otherwise(mut self, outcome: Outcome) -> Self {
        self.fallback = Some(outcome);
        self
    }

    /// Number of requests sent so far.
    #[must_use]
    pub fn sends(&self) -> usize {
        self.sent.lock().len()
    }

    /// Number of scripted outcomes not yet used.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.sent.lock().clone()
    }

    /// The request sent at `index`.
    ///
    /// # Errors
    ///
    /// Returns `TestError::NoRequest` if fewer requests were sent.
    pub fn request(&self, index: usize) -> Result<CapturedRequest, TestError> {
        self.sent
            .lock()
            .get(index)
            .cloned()
            .ok_or(TestError::NoRequest(index))
    }

    /// The most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<CapturedRequest> {
        self.sent.lock().last().cloned()
    }

    fn next_outcome(&self) -> Option<Outcome> {
        self.script
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone())
    }
}

impl Transport for MockTransport {
    fn send<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, SdkResult<HttpResponse>> {
        self.sent.lock().push(CapturedRequest::capture(request));
        let outcome = self.next_outcome();

        Box::pin(async move {
            match outcome {
                Some(Outcome::Respond(response)) => Ok(response),
                Some(Outcome::Fail(err)) => Err(err),
                Some(Outcome::RespondAfter(delay, response)) => {
                    tokio::select! {
                        () = tokio::time::sleep(delay) => Ok(response),
                        () = cancel.cancelled() => Err(SdkError::cancelled("mock send cancelled")),
                    }
                }
                Some(Outcome::Hang) => {
                    cancel.cancelled().await;
                    Err(SdkError::cancelled("mock send cancelled"))
                }
                None => Err(SdkError::transport("mock transport script exhausted")),
            }
        })
    }
}
