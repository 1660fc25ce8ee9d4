//! Retry coordination.
//!
//! The [`RetryStep`] sits in the Finalize phase. It drives each attempt of a
//! call through an explicit state machine:
//!
//! ```text
//! Idle → Attempting ─┬─ ok ─────────────────────────────→ Succeeded
//!                    ├─ final error ────────────────────→ FailedFinal
//!                    ├─ retryable, budget left ─→ BackingOff → Attempting
//!                    └─ retryable, budget spent ─→ Exhausted → FailedFinal
//! ```
//!
//! The first attempt continues down the chain from the retry step. Every
//! later attempt rewinds the request to the checkpoint taken when the Build
//! phase was first entered and re-runs the chain from the first Build step,
//! so build-time headers and the signature are recomputed. While an attempt
//! is in flight the retry step passes straight through when the re-driven
//! chain reaches it again.

mod backoff;
mod classifier;
mod token_bucket;

pub use backoff::Backoff;
pub use classifier::{
    RetryClassifier, RetryKind, THROTTLING_CODES, THROTTLING_STATUS, TRANSIENT_CODES,
    TRANSIENT_STATUS,
};
pub use token_bucket::TokenBucket;

use crate::context::InvocationContext;
use crate::headers;
use crate::phase::Phase;
use crate::step::{BoxFuture, Next, Step};
use http::{HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::{SdkError, SdkResult};
use strata_telemetry::metrics;
use tracing::{debug, trace, warn};

/// Retry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum attempts per call, including the first (default: 3).
    pub max_attempts: u32,
    /// Base backoff delay (default: 100ms).
    pub base_delay: Duration,
    /// Cap on the exponential delay before jitter (default: 20s). The
    /// longest possible wait is `max_backoff * (1 + jitter)`.
    pub max_backoff: Duration,
    /// Jitter fraction added on top of the capped delay (default: 1.0).
    pub jitter: f64,
    /// Tokens withdrawn for a throttling retry (default: 5).
    pub retry_cost: u32,
    /// Tokens withdrawn for a timeout retry (default: 10).
    pub timeout_retry_cost: u32,
    /// Tokens returned by a call that succeeds first time (default: 1).
    pub success_refund: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_backoff: Duration::from_secs(20),
            jitter: 1.0,
            retry_cost: 5,
            timeout_retry_cost: 10,
            success_refund: 1,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns the backoff these settings describe.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay, self.max_backoff, self.jitter)
    }
}

/// States of one call's retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryState {
    /// No attempt made yet.
    Idle,
    /// An attempt is running.
    Attempting,
    /// Waiting before the next attempt.
    BackingOff,
    /// The attempt budget or the retry quota ran out.
    Exhausted,
    /// An attempt succeeded.
    Succeeded,
    /// The call failed and will not be retried.
    FailedFinal,
}

impl RetryState {
    /// Returns `true` for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedFinal)
    }
}

/// States visited by the retry loop of the current call, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryTrace(pub Vec<RetryState>);

enum Decision {
    Final,
    Exhausted,
    Retry { delay: Duration, cost: u32 },
}

/// The retry coordinator step.
#[derive(Debug)]
pub struct RetryStep {
    config: RetryConfig,
    backoff: Backoff,
    bucket: Arc<TokenBucket>,
    classifier: RetryClassifier,
}

impl RetryStep {
    /// Step id.
    pub const ID: &'static str = "retry";

    /// Creates a retry step drawing from `bucket`.
    #[must_use]
    pub fn new(config: RetryConfig, bucket: Arc<TokenBucket>) -> Self {
        Self {
            backoff: config.backoff(),
            config,
            bucket,
            classifier: RetryClassifier::default(),
        }
    }

    /// Replaces the classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: RetryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    async fn drive(&self, ctx: &mut InvocationContext, next: Next<'_>) -> SdkResult<()> {
        let max_attempts = ctx
            .call()
            .max_attempts()
            .unwrap_or(self.config.max_attempts)
            .max(1);

        let mut state = RetryState::Idle;
        let mut attempt = 0;
        let mut acquired = 0;
        let mut delay = Duration::ZERO;
        let mut last_error: Option<SdkError> = None;

        loop {
            transition(ctx, state);
            state = match state {
                RetryState::Idle => RetryState::Attempting,
                RetryState::Attempting => {
                    attempt += 1;
                    match self.attempt(ctx, next, attempt, max_attempts).await {
                        Ok(()) => RetryState::Succeeded,
                        Err(err) => {
                            let decision = self.decide(ctx, &err, attempt, max_attempts);
                            last_error = Some(err);
                            match decision {
                                Decision::Final => RetryState::FailedFinal,
                                Decision::Exhausted => RetryState::Exhausted,
                                Decision::Retry {
                                    delay: wait,
                                    cost,
                                } => {
                                    acquired += cost;
                                    delay = wait;
                                    RetryState::BackingOff
                                }
                            }
                        }
                    }
                }
                RetryState::BackingOff => {
                    let cancel = ctx.cancellation().clone();
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            last_error = Some(SdkError::cancelled("call cancelled during retry backoff"));
                            RetryState::FailedFinal
                        }
                        () = tokio::time::sleep(delay) => RetryState::Attempting,
                    }
                }
                RetryState::Exhausted => {
                    last_error = last_error.map(|err| {
                        if ctx.is_cancelled() {
                            SdkError::cancelled("call cancelled between attempts")
                        } else {
                            SdkError::exhausted(attempt, err)
                        }
                    });
                    RetryState::FailedFinal
                }
                RetryState::Succeeded => {
                    self.bucket.release(if acquired > 0 {
                        acquired
                    } else {
                        self.config.success_refund
                    });
                    ctx.metadata_mut().set_attempts(attempt);
                    if attempt > 1 {
                        debug!(
                            operation = ctx.operation().name(),
                            attempt, "call succeeded after retry"
                        );
                    }
                    return Ok(());
                }
                RetryState::FailedFinal => {
                    ctx.metadata_mut().set_attempts(attempt);
                    return Err(last_error
                        .unwrap_or_else(|| SdkError::assembly("retry loop ended without an error")));
                }
            };
        }
    }

    async fn attempt(
        &self,
        ctx: &mut InvocationContext,
        next: Next<'_>,
        attempt: u32,
        max_attempts: u32,
    ) -> SdkResult<()> {
        ctx.begin_attempt(attempt, max_attempts);
        let started = Instant::now();
        let result = Self::run_attempt(ctx, next, attempt, max_attempts).await;
        ctx.end_attempt(started.elapsed());
        result
    }

    async fn run_attempt(
        ctx: &mut InvocationContext,
        next: Next<'_>,
        attempt: u32,
        max_attempts: u32,
    ) -> SdkResult<()> {
        let next = if attempt > 1 {
            ctx.rewind()?;
            next.restart(Phase::Build)
        } else {
            next
        };

        if let Some(request) = ctx.request_mut() {
            let value = HeaderValue::from_str(&format!("attempt={attempt}; max={max_attempts}"))
                .map_err(|e| SdkError::assembly(format!("invalid attempt header: {e}")))?;
            request.set_header(HeaderName::from_static(headers::ATTEMPT), value);
        }

        metrics::record_attempt(ctx.operation().name());
        trace!(operation = ctx.operation().name(), attempt, max_attempts, "starting attempt");
        next.run(ctx).await
    }

    fn decide(
        &self,
        ctx: &InvocationContext,
        err: &SdkError,
        attempt: u32,
        max_attempts: u32,
    ) -> Decision {
        let Some(kind) = self.classifier.classify(err) else {
            return Decision::Final;
        };
        let operation = ctx.operation().name();

        if attempt >= max_attempts || ctx.is_cancelled() {
            warn!(operation, attempt, error = %err, "retry budget exhausted");
            return Decision::Exhausted;
        }

        let cost = match kind {
            RetryKind::Throttling => self.config.retry_cost,
            RetryKind::Timeout => self.config.timeout_retry_cost,
            RetryKind::Transient => 0,
        };
        if cost > 0 && !self.bucket.try_acquire(cost) {
            warn!(
                operation,
                attempt,
                available = self.bucket.available(),
                cost,
                "retry quota exhausted"
            );
            return Decision::Exhausted;
        }

        let delay = self.backoff.delay(attempt - 1);
        warn!(
            operation,
            attempt,
            kind = kind.as_str(),
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after {} error",
            kind.as_str()
        );
        metrics::record_retry(operation, kind.as_str());
        Decision::Retry { delay, cost }
    }
}

fn transition(ctx: &mut InvocationContext, state: RetryState) {
    trace!(operation = ctx.operation().name(), ?state, "retry state");
    match ctx.extension_mut::<RetryTrace>() {
        Some(trace) => trace.0.push(state),
        None => ctx.insert_extension(RetryTrace(vec![state])),
    }
}

impl Step for RetryStep {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            if ctx.in_attempt() {
                return next.run(ctx).await;
            }
            self.drive(ctx, next).await
        })
    }
}
