//! Core step trait and chain cursor.
//!
//! This module defines the [`Step`] trait that every pipeline step implements.
//! A step receives the mutable [`InvocationContext`] and a [`Next`] cursor.
//! Work done before `next.run(ctx)` happens on the way down the chain, work
//! done after it happens on the way back up with the response or error in
//! hand.
//!
//! # Example
//!
//! ```ignore
//! use strata_middleware::{BoxFuture, InvocationContext, Next, Step};
//! use strata_core::SdkResult;
//!
//! struct Timing;
//!
//! impl Step for Timing {
//!     fn id(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn handle<'a>(
//!         &'a self,
//!         ctx: &'a mut InvocationContext,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, SdkResult<()>> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             let result = next.run(ctx).await;
//!             tracing::debug!(elapsed = ?start.elapsed(), "downstream finished");
//!             result
//!         })
//!     }
//! }
//! ```

use crate::context::InvocationContext;
use crate::phase::Phase;
use crate::transport::Transport;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use strata_core::{SdkError, SdkResult, TypeTag};

/// A boxed future returned by steps and transports.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of work in one phase of the pipeline.
///
/// # Invariants
///
/// - A step continues the chain by calling `next.run(ctx)`. Returning
///   without calling it short-circuits the call.
/// - A step must not swallow a downstream error unless it is the retry step.
/// - Step ids are unique within a phase.
pub trait Step: Send + Sync + 'static {
    /// Returns the id of this step, unique within its phase.
    fn id(&self) -> &'static str;

    /// Returns the concrete input type this step reads, if any.
    ///
    /// The stack builder rejects a step whose input type disagrees with the
    /// operation it is assembled for.
    fn input_type(&self) -> Option<TypeTag> {
        None
    }

    /// Returns the concrete output type this step produces, if any.
    fn output_type(&self) -> Option<TypeTag> {
        None
    }

    /// Runs this step.
    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>>;
}

/// Resolved, flattened step list for one stack.
///
/// Steps are stored phase by phase. `phase_starts[p]` is the index of the
/// first step of phase `p`; an empty phase starts where the next one does.
pub(crate) struct Chain {
    steps: Vec<Arc<dyn Step>>,
    phase_starts: [usize; Phase::COUNT],
}

impl Chain {
    pub(crate) fn new(phases: [Vec<Arc<dyn Step>>; Phase::COUNT]) -> Self {
        let mut steps = Vec::new();
        let mut phase_starts = [0; Phase::COUNT];
        for (i, phase_steps) in phases.into_iter().enumerate() {
            phase_starts[i] = steps.len();
            steps.extend(phase_steps);
        }
        Self {
            steps,
            phase_starts,
        }
    }

    pub(crate) fn phase(&self, phase: Phase) -> &[Arc<dyn Step>] {
        let start = self.phase_starts[phase.index()];
        let end = self
            .phase_starts
            .get(phase.index() + 1)
            .copied()
            .unwrap_or(self.steps.len());
        &self.steps[start..end]
    }

    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }

    fn phase_start(&self, phase: Phase) -> usize {
        self.phase_starts[phase.index()]
    }

    /// Phases whose first step sits at `cursor`, in pipeline order.
    fn phases_starting_at(&self, cursor: usize, floor: Phase) -> impl Iterator<Item = Phase> + '_ {
        Phase::all()
            .into_iter()
            .filter(move |p| *p >= floor && self.phase_starts[p.index()] == cursor)
    }
}

/// Cursor into the remaining step chain.
///
/// `Next` is `Copy`: the retry step keeps its own cursor and runs the rest of
/// the chain once per attempt. Calling [`Next::restart`] yields a cursor
/// positioned at the first step of an earlier phase, which is how a retry
/// re-drives the Build phase against a rewound request.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a Chain,
    transport: &'a dyn Transport,
    cursor: usize,
    floor: Phase,
}

impl<'a> Next<'a> {
    pub(crate) fn start(chain: &'a Chain, transport: &'a dyn Transport) -> Self {
        Self {
            chain,
            transport,
            cursor: 0,
            floor: Phase::Initialize,
        }
    }

    /// Returns a cursor positioned at the first step of `phase`.
    #[must_use]
    pub fn restart(self, phase: Phase) -> Self {
        Self {
            cursor: self.chain.phase_start(phase),
            floor: phase,
            ..self
        }
    }

    /// Runs the remainder of the chain, ending with the transport send.
    pub async fn run(self, ctx: &mut InvocationContext) -> SdkResult<()> {
        for phase in self.chain.phases_starting_at(self.cursor, self.floor) {
            ctx.enter_phase(phase)?;
        }

        match self.chain.steps.get(self.cursor) {
            Some(step) => {
                let next = Self {
                    cursor: self.cursor + 1,
                    ..self
                };
                step.handle(ctx, next).await
            }
            None => dispatch(ctx, self.transport).await,
        }
    }
}

/// Terminal handler: hands the finalized request to the transport.
async fn dispatch(ctx: &mut InvocationContext, transport: &dyn Transport) -> SdkResult<()> {
    ctx.check_cancelled("before network send")?;
    let request = ctx
        .take_request()
        .ok_or_else(|| SdkError::assembly("no request to send; serializer did not run"))?;
    ctx.record_transmission();

    let cancel = ctx.cancellation().clone();
    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SdkError::cancelled("cancelled during network send")),
        result = transport.send(request, &cancel) => result?,
    };
    ctx.set_response(response);
    Ok(())
}

/// A step built from a synchronous closure that runs before the rest of the
/// chain.
///
/// # Example
///
/// ```ignore
/// let step = FnStep::new("tag", |ctx: &mut InvocationContext| {
///     ctx.insert_extension(Tagged);
///     Ok(())
/// });
/// ```
pub struct FnStep<F> {
    id: &'static str,
    func: F,
}

impl<F> FnStep<F> {
    /// Creates a new closure step.
    pub const fn new(id: &'static str, func: F) -> Self {
        Self { id, func }
    }
}

impl<F> Step for FnStep<F>
where
    F: Fn(&mut InvocationContext) -> SdkResult<()> + Send + Sync + 'static,
{
    fn id(&self) -> &'static str {
        self.id
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<()>> {
        Box::pin(async move {
            (self.func)(ctx)?;
            next.run(ctx).await
        })
    }
}
