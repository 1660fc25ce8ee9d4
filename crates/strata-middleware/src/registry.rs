//! Per-phase step registries.
//!
//! Each phase owns an ordered list of steps. Steps are placed relative to
//! the list ends or to an existing step by id. When two steps are placed
//! relative to the same anchor, the one registered last ends up adjacent to
//! it.
//!
//! ```text
//! add(A, Front)      → [A]
//! add(B, After(A))   → [A, B]
//! add(C, Before(A))  → [C, A, B]
//! add(D, After(A))   → [C, A, D, B]
//! ```

use crate::phase::Phase;
use crate::step::Step;
use std::fmt;
use std::sync::Arc;
use strata_core::SdkError;
use thiserror::Error;

/// Where to place a step within its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Before every existing step.
    Front,
    /// After every existing step.
    Back,
    /// Immediately before the step with this id.
    Before(&'static str),
    /// Immediately after the step with this id.
    After(&'static str),
}

/// Position relative to an anchor step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relative {
    /// Immediately before the anchor.
    Before,
    /// Immediately after the anchor.
    After,
}

/// A failure to place, find or remove a step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    /// A step with this id is already registered in the phase.
    #[error("step '{id}' is already registered in the {phase} phase")]
    DuplicateStep {
        /// Phase.
        phase: Phase,
        /// Step id.
        id: &'static str,
    },

    /// The anchor named by a placement does not exist.
    #[error("cannot place step '{id}' relative to '{anchor}': no such step in the {phase} phase")]
    MissingAnchor {
        /// Phase.
        phase: Phase,
        /// Step being placed.
        id: &'static str,
        /// Anchor that was not found.
        anchor: &'static str,
    },

    /// No step with this id exists.
    #[error("no step '{id}' in the {phase} phase")]
    UnknownStep {
        /// Phase.
        phase: Phase,
        /// Step id.
        id: String,
    },
}

impl From<OrderingError> for SdkError {
    fn from(err: OrderingError) -> Self {
        SdkError::assembly(err.to_string())
    }
}

/// A step together with the phase and placement it should be registered at.
#[derive(Clone)]
pub struct StepRegistration {
    phase: Phase,
    placement: Placement,
    step: Arc<dyn Step>,
}

impl StepRegistration {
    /// Creates a registration.
    pub fn new(phase: Phase, placement: Placement, step: impl Step) -> Self {
        Self {
            phase,
            placement,
            step: Arc::new(step),
        }
    }

    /// Creates a registration from an already shared step.
    #[must_use]
    pub fn shared(phase: Phase, placement: Placement, step: Arc<dyn Step>) -> Self {
        Self {
            phase,
            placement,
            step,
        }
    }

    /// Returns the phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the placement.
    #[must_use]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Returns the step.
    #[must_use]
    pub fn step(&self) -> &Arc<dyn Step> {
        &self.step
    }

    /// Returns the step id.
    #[must_use]
    pub fn id(&self) -> &'static str {
        self.step.id()
    }
}

impl fmt::Debug for StepRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistration")
            .field("phase", &self.phase)
            .field("placement", &self.placement)
            .field("id", &self.step.id())
            .finish()
    }
}

/// The ordered steps of one phase.
#[derive(Clone)]
pub struct StageRegistry {
    phase: Phase,
    steps: Vec<Arc<dyn Step>>,
}

impl StageRegistry {
    /// Creates an empty registry for `phase`.
    #[must_use]
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            steps: Vec::new(),
        }
    }

    /// Returns the phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Adds a step at `placement`.
    ///
    /// # Errors
    ///
    /// Fails if the id is taken or the anchor does not exist.
    pub fn add(&mut self, step: Arc<dyn Step>, placement: Placement) -> Result<(), OrderingError> {
        let id = step.id();
        if self.position(id).is_some() {
            return Err(OrderingError::DuplicateStep {
                phase: self.phase,
                id,
            });
        }

        let index = match placement {
            Placement::Front => 0,
            Placement::Back => self.steps.len(),
            Placement::Before(anchor) => self.anchor(id, anchor)?,
            Placement::After(anchor) => self.anchor(id, anchor)? + 1,
        };
        self.steps.insert(index, step);
        Ok(())
    }

    /// Inserts a step next to an existing one.
    ///
    /// # Errors
    ///
    /// Fails if the id is taken or the anchor does not exist.
    pub fn insert(
        &mut self,
        anchor: &'static str,
        step: Arc<dyn Step>,
        relative: Relative,
    ) -> Result<(), OrderingError> {
        let placement = match relative {
            Relative::Before => Placement::Before(anchor),
            Relative::After => Placement::After(anchor),
        };
        self.add(step, placement)
    }

    /// Removes a step by id and returns it.
    ///
    /// # Errors
    ///
    /// Fails if no such step exists.
    pub fn remove(&mut self, id: &str) -> Result<Arc<dyn Step>, OrderingError> {
        let index = self.require(id)?;
        Ok(self.steps.remove(index))
    }

    /// Replaces the step with id `id` in place and returns the old one.
    ///
    /// # Errors
    ///
    /// Fails if no such step exists, or if the replacement's id belongs to
    /// another step in the phase.
    pub fn swap(&mut self, id: &str, step: Arc<dyn Step>) -> Result<Arc<dyn Step>, OrderingError> {
        let index = self.require(id)?;
        let new_id = step.id();
        if new_id != id && self.position(new_id).is_some() {
            return Err(OrderingError::DuplicateStep {
                phase: self.phase,
                id: new_id,
            });
        }
        Ok(std::mem::replace(&mut self.steps[index], step))
    }

    /// Returns the step with id `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Step>> {
        self.position(id).map(|i| &self.steps[i])
    }

    /// Returns step ids in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no steps are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterates steps in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Step>> {
        self.steps.iter()
    }

    pub(crate) fn into_steps(self) -> Vec<Arc<dyn Step>> {
        self.steps
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id() == id)
    }

    fn anchor(&self, id: &'static str, anchor: &'static str) -> Result<usize, OrderingError> {
        self.position(anchor).ok_or(OrderingError::MissingAnchor {
            phase: self.phase,
            id,
            anchor,
        })
    }

    fn require(&self, id: &str) -> Result<usize, OrderingError> {
        self.position(id).ok_or_else(|| OrderingError::UnknownStep {
            phase: self.phase,
            id: id.to_string(),
        })
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("phase", &self.phase)
            .field("steps", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InvocationContext;
    use crate::step::{BoxFuture, Next};
    use proptest::prelude::*;
    use strata_core::SdkResult;

    struct Named(&'static str);

    impl Step for Named {
        fn id(&self) -> &'static str {
            self.0
        }

        fn handle<'a>(
            &'a self,
            ctx: &'a mut InvocationContext,
            next: Next<'a>,
        ) -> BoxFuture<'a, SdkResult<()>> {
            Box::pin(next.run(ctx))
        }
    }

    fn step(id: &'static str) -> Arc<dyn Step> {
        Arc::new(Named(id))
    }

    fn registry() -> StageRegistry {
        StageRegistry::new(Phase::Build)
    }

    #[test]
    fn test_front_after_before_resolves() {
        let mut reg = registry();
        reg.add(step("A"), Placement::Front).unwrap();
        reg.add(step("B"), Placement::After("A")).unwrap();
        reg.add(step("C"), Placement::Before("A")).unwrap();
        assert_eq!(reg.ids(), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_last_registered_is_adjacent() {
        let mut reg = registry();
        reg.add(step("A"), Placement::Back).unwrap();
        reg.add(step("B"), Placement::After("A")).unwrap();
        reg.add(step("C"), Placement::After("A")).unwrap();
        reg.add(step("X"), Placement::Before("A")).unwrap();
        reg.add(step("Y"), Placement::Before("A")).unwrap();
        assert_eq!(reg.ids(), vec!["X", "Y", "A", "C", "B"]);
    }

    #[test]
    fn test_front_and_back() {
        let mut reg = registry();
        reg.add(step("middle"), Placement::Back).unwrap();
        reg.add(step("last"), Placement::Back).unwrap();
        reg.add(step("first"), Placement::Front).unwrap();
        assert_eq!(reg.ids(), vec!["first", "middle", "last"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut reg = registry();
        reg.add(step("A"), Placement::Back).unwrap();
        let err = reg.add(step("A"), Placement::Front).unwrap_err();
        assert_eq!(
            err,
            OrderingError::DuplicateStep {
                phase: Phase::Build,
                id: "A"
            }
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_missing_anchor_rejected() {
        let mut reg = registry();
        let err = reg.add(step("B"), Placement::After("A")).unwrap_err();
        assert!(matches!(err, OrderingError::MissingAnchor { anchor: "A", .. }));
        assert!(reg.is_empty());

        let sdk: SdkError = err.into();
        assert_eq!(sdk.kind(), strata_core::ErrorKind::Assembly);
        assert!(sdk.message().contains("no such step"));
    }

    #[test]
    fn test_insert_remove_swap_get() {
        let mut reg = registry();
        reg.add(step("A"), Placement::Back).unwrap();
        reg.insert("A", step("B"), Relative::After).unwrap();
        reg.insert("A", step("Z"), Relative::Before).unwrap();
        assert_eq!(reg.ids(), vec!["Z", "A", "B"]);

        let removed = reg.remove("Z").unwrap();
        assert_eq!(removed.id(), "Z");
        assert!(reg.get("Z").is_none());

        let old = reg.swap("A", step("A2")).unwrap();
        assert_eq!(old.id(), "A");
        assert_eq!(reg.ids(), vec!["A2", "B"]);
        assert!(reg.get("A2").is_some());

        assert!(matches!(
            reg.remove("missing"),
            Err(OrderingError::UnknownStep { .. })
        ));
        assert!(matches!(
            reg.swap("A2", step("B")),
            Err(OrderingError::DuplicateStep { id: "B", .. })
        ));
    }

    const IDS: [&str; 6] = ["s0", "s1", "s2", "s3", "s4", "s5"];

    fn placement_strategy() -> impl Strategy<Value = (usize, u8, usize)> {
        (0..IDS.len(), 0u8..4, 0..IDS.len())
    }

    fn apply(ops: &[(usize, u8, usize)]) -> Vec<&'static str> {
        let mut reg = registry();
        for &(id, kind, anchor) in ops {
            let placement = match kind {
                0 => Placement::Front,
                1 => Placement::Back,
                2 => Placement::Before(IDS[anchor]),
                _ => Placement::After(IDS[anchor]),
            };
            // Rejected registrations leave the registry unchanged.
            let _ = reg.add(step(IDS[id]), placement);
        }
        reg.ids()
    }

    proptest! {
        #[test]
        fn prop_resolution_is_deterministic(ops in prop::collection::vec(placement_strategy(), 0..24)) {
            let first = apply(&ops);
            let second = apply(&ops);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_ids_stay_unique(ops in prop::collection::vec(placement_strategy(), 0..24)) {
            let ids = apply(&ops);
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), ids.len());
        }

        #[test]
        fn prop_after_anchor_is_adjacent(anchor in 0..IDS.len(), others in prop::collection::vec(0..IDS.len(), 0..5)) {
            let mut reg = registry();
            reg.add(step(IDS[anchor]), Placement::Back).unwrap();
            for other in others {
                if other != anchor {
                    let _ = reg.add(step(IDS[other]), Placement::Back);
                }
            }
            reg.add(step("placed"), Placement::After(IDS[anchor])).unwrap();
            let ids = reg.ids();
            let a = ids.iter().position(|id| *id == IDS[anchor]).unwrap();
            prop_assert_eq!(ids[a + 1], "placed");
        }
    }
}
