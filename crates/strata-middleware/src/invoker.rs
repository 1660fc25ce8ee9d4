//! Driving a call through a stack.

use crate::context::{CallContext, InvocationContext};
use crate::stack::Stack;
use crate::step::Next;
use crate::transport::Transport;
use std::sync::Arc;
use strata_core::{ResultMetadata, SdkError, SdkResult, TypeErasedBox};

/// The typed result of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output<O> {
    /// Deserialized output.
    pub value: O,
    /// Metadata collected during the call.
    pub metadata: ResultMetadata,
}

impl<O> Output<O> {
    /// Returns the output value, discarding metadata.
    pub fn into_inner(self) -> O {
        self.value
    }
}

impl<O> std::ops::Deref for Output<O> {
    type Target = O;

    fn deref(&self) -> &O {
        &self.value
    }
}

/// Runs calls through a stack and a transport.
///
/// An invoker is cheap to clone and can drive any number of concurrent
/// calls; every call gets its own [`InvocationContext`].
#[derive(Clone)]
pub struct Invoker {
    stack: Arc<Stack>,
    transport: Arc<dyn Transport>,
}

impl Invoker {
    /// Creates an invoker.
    #[must_use]
    pub fn new(stack: Arc<Stack>, transport: Arc<dyn Transport>) -> Self {
        Self { stack, transport }
    }

    /// Returns the stack.
    #[must_use]
    pub fn stack(&self) -> &Arc<Stack> {
        &self.stack
    }

    /// Runs one call with an erased input and returns the erased output.
    ///
    /// Exactly one outcome is produced: the output with its metadata, or an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns whatever the pipeline fails with, or an assembly error if the
    /// input is of the wrong type or no step produced an output.
    pub async fn invoke(
        &self,
        call: CallContext,
        input: TypeErasedBox,
    ) -> SdkResult<(TypeErasedBox, ResultMetadata)> {
        let operation = self.stack.operation();
        if input.type_id() != operation.input().id() {
            return Err(SdkError::assembly(format!(
                "{} takes {}, got {}",
                operation.name(),
                operation.input().name(),
                input.type_name()
            )));
        }

        let mut ctx = InvocationContext::new(operation.clone(), call, input);
        Next::start(self.stack.chain(), self.transport.as_ref())
            .run(&mut ctx)
            .await?;

        let output = ctx.take_output().ok_or_else(|| {
            SdkError::assembly(format!("{}: no step produced an output", operation.name()))
        })?;
        Ok((output, ctx.into_metadata()))
    }

    /// Runs one call with a typed input and output.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub async fn call<I, O>(&self, call: CallContext, input: I) -> SdkResult<Output<O>>
    where
        I: Send + Sync + 'static,
        O: Send + Sync + 'static,
    {
        let (output, metadata) = self.invoke(call, TypeErasedBox::new(input)).await?;
        let value = output.downcast::<O>().map_err(|output| {
            SdkError::assembly(format!(
                "output type mismatch: expected {}, found {}",
                std::any::type_name::<O>(),
                output.type_name()
            ))
        })?;
        Ok(Output { value, metadata })
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}
