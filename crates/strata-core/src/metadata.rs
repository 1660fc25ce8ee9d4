//! Result metadata returned alongside every successful output.

use crate::context::InvocationId;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Side-channel data accumulated while an operation call runs.
///
/// The pipeline fills this in as the call progresses; the caller receives a
/// read-only copy attached to the typed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMetadata {
    invocation_id: InvocationId,
    operation: String,
    request_id: Option<String>,
    attempts: u32,
    http_status: Option<u16>,
    started_at: DateTime<Utc>,
    duration: Duration,
    attempt_latencies: Vec<Duration>,
    server_time: Option<DateTime<Utc>>,
}

impl ResultMetadata {
    /// Creates empty metadata for a call that is about to start.
    #[must_use]
    pub fn new(invocation_id: InvocationId, operation: impl Into<String>) -> Self {
        Self {
            invocation_id,
            operation: operation.into(),
            request_id: None,
            attempts: 0,
            http_status: None,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            attempt_latencies: Vec::new(),
            server_time: None,
        }
    }

    /// Returns the invocation id sent with every attempt.
    #[must_use]
    pub fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Returns the operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the service request id of the final response.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Returns the number of attempts performed.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the HTTP status of the final response.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Returns when the call started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the total wall time of the call.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the latency of each attempt, in order.
    #[must_use]
    pub fn attempt_latencies(&self) -> &[Duration] {
        &self.attempt_latencies
    }

    /// Returns the server clock reported by the final response.
    #[must_use]
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        self.server_time
    }

    /// Records the service request id.
    pub fn set_request_id(&mut self, request_id: impl Into<String>) {
        self.request_id = Some(request_id.into());
    }

    /// Records the number of attempts.
    pub fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }

    /// Records the HTTP status.
    pub fn set_http_status(&mut self, status: u16) {
        self.http_status = Some(status);
    }

    /// Records the total wall time.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Appends an attempt latency.
    pub fn push_attempt_latency(&mut self, latency: Duration) {
        self.attempt_latencies.push(latency);
    }

    /// Records the server clock.
    pub fn set_server_time(&mut self, time: DateTime<Utc>) {
        self.server_time = Some(time);
    }
}
