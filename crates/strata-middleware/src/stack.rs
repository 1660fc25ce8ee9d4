//! Stack assembly.
//!
//! A [`Stack`] is the fully resolved, immutable step list for one operation.
//! It is produced by a [`StackBuilder`] from the common steps shared by every
//! operation plus the operation's own serializer, deserializer and
//! validator. Assembly is where wiring mistakes surface: duplicate ids,
//! missing anchors, and steps whose input or output type disagrees with the
//! operation.
//!
//! # Example
//!
//! ```ignore
//! use strata_middleware::{Phase, Placement, StackBuilder, StepRegistration};
//!
//! let stack = StackBuilder::assemble(
//!     operation,
//!     common_steps,
//!     vec![StepRegistration::new(
//!         Phase::Serialize,
//!         Placement::Before("resolve_endpoint"),
//!         serializer,
//!     )],
//! )?;
//! println!("{}", stack.describe());
//! ```

use crate::phase::Phase;
use crate::registry::{OrderingError, StageRegistry, StepRegistration};
use crate::step::Chain;
use std::fmt::Write as _;
use strata_core::{Operation, SdkError, SdkResult};

/// Builds a [`Stack`] for one operation.
#[derive(Debug)]
pub struct StackBuilder {
    operation: Operation,
    registries: [StageRegistry; Phase::COUNT],
}

impl StackBuilder {
    /// Creates an empty builder for `operation`.
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            registries: Phase::all().map(StageRegistry::new),
        }
    }

    /// Assembles a stack from common steps followed by operation steps.
    ///
    /// Registrations are applied in order, so operation steps may anchor on
    /// common steps.
    ///
    /// # Errors
    ///
    /// Returns an assembly error on any ordering or wiring failure.
    pub fn assemble(
        operation: Operation,
        common: impl IntoIterator<Item = StepRegistration>,
        operation_steps: impl IntoIterator<Item = StepRegistration>,
    ) -> SdkResult<Stack> {
        let mut builder = Self::new(operation);
        for registration in common.into_iter().chain(operation_steps) {
            builder.add(registration)?;
        }
        builder.build()
    }

    /// Registers a step.
    ///
    /// # Errors
    ///
    /// Fails if the id is taken or the anchor does not exist.
    pub fn add(&mut self, registration: StepRegistration) -> Result<&mut Self, OrderingError> {
        let phase = registration.phase();
        self.registries[phase.index()]
            .add(registration.step().clone(), registration.placement())?;
        Ok(self)
    }

    /// Returns the operation being assembled.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Returns the registry of one phase.
    #[must_use]
    pub fn phase(&self, phase: Phase) -> &StageRegistry {
        &self.registries[phase.index()]
    }

    /// Returns the registry of one phase for in-place edits.
    pub fn phase_mut(&mut self, phase: Phase) -> &mut StageRegistry {
        &mut self.registries[phase.index()]
    }

    /// Checks wiring and freezes the stack.
    ///
    /// # Errors
    ///
    /// Returns an assembly error if a step declares an input or output type
    /// that is not the operation's.
    pub fn build(self) -> SdkResult<Stack> {
        for registry in &self.registries {
            for step in registry.iter() {
                check_type(
                    &self.operation,
                    registry.phase(),
                    step.id(),
                    "input",
                    step.input_type(),
                    self.operation.input(),
                )?;
                check_type(
                    &self.operation,
                    registry.phase(),
                    step.id(),
                    "output",
                    step.output_type(),
                    self.operation.output(),
                )?;
            }
        }

        let chain = Chain::new(self.registries.map(StageRegistry::into_steps));
        Ok(Stack {
            operation: self.operation,
            chain,
        })
    }
}

fn check_type(
    operation: &Operation,
    phase: Phase,
    id: &str,
    what: &str,
    declared: Option<strata_core::TypeTag>,
    expected: strata_core::TypeTag,
) -> SdkResult<()> {
    match declared {
        Some(declared) if declared != expected => Err(SdkError::assembly(format!(
            "step '{id}' in the {phase} phase expects {what} {}, but {} uses {}",
            declared.name(),
            operation.name(),
            expected.name()
        ))),
        _ => Ok(()),
    }
}

/// A resolved, immutable step list for one operation.
///
/// Stacks can be shared across concurrent calls; all per-call state lives
/// in the [`InvocationContext`](crate::InvocationContext).
pub struct Stack {
    operation: Operation,
    chain: Chain,
}

impl Stack {
    /// Returns the operation this stack serves.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Returns the step ids of one phase in execution order.
    #[must_use]
    pub fn ids(&self, phase: Phase) -> Vec<&'static str> {
        self.chain.phase(phase).iter().map(|s| s.id()).collect()
    }

    /// Returns the total number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` if the stack has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.len() == 0
    }

    /// Renders the resolved order, one line per phase.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!("{}.{}", self.operation.service_id(), self.operation.name());
        for phase in Phase::all() {
            let ids = self.ids(phase);
            let steps = if ids.is_empty() {
                "-".to_string()
            } else {
                ids.join(" -> ")
            };
            let _ = write!(out, "\n  {:<11} {steps}", phase.name());
        }
        out
    }

    pub(crate) fn chain(&self) -> &Chain {
        &self.chain
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("operation", &self.operation.name())
            .field("steps", &self.chain.len())
            .finish()
    }
}
