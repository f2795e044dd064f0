//! Ordered multi-phase advice chain bound to one symbolic name.

use std::fmt;

use parking_lot::RwLock;

use crate::advice::{Advice, AdviceError, Phase};
use crate::context::InvocationContext;

#[derive(Default)]
struct Buckets {
    before: Vec<Advice>,
    after: Vec<Advice>,
    around: Vec<Advice>,
    after_returning: Vec<Advice>,
    after_throwing: Vec<Advice>,
}

impl Buckets {
    fn bucket(&self, phase: Phase) -> &Vec<Advice> {
        match phase {
            Phase::Before => &self.before,
            Phase::After => &self.after,
            Phase::Around => &self.around,
            Phase::AfterReturning => &self.after_returning,
            Phase::AfterThrowing => &self.after_throwing,
        }
    }

    fn bucket_mut(&mut self, phase: Phase) -> &mut Vec<Advice> {
        match phase {
            Phase::Before => &mut self.before,
            Phase::After => &mut self.after,
            Phase::Around => &mut self.around,
            Phase::AfterReturning => &mut self.after_returning,
            Phase::AfterThrowing => &mut self.after_throwing,
        }
    }

    fn total(&self) -> usize {
        self.before.len()
            + self.after.len()
            + self.around.len()
            + self.after_returning.len()
            + self.after_throwing.len()
    }
}

/// The ordered set of all advice, across all phases, bound to one symbolic
/// operation name.
///
/// Lifecycle: created empty when a name is registered, mutated only by
/// appending advice, removed only when the whole name is unregistered.
///
/// The internal lock guarantees memory safety, nothing more. An `add`
/// racing an in-flight execution of the same chain has unspecified ordering
/// for that call: each phase snapshots its bucket at entry, and the
/// snapshot decides what the call observes. Configure advice at startup and
/// treat chains as read-only afterwards.
#[derive(Default)]
pub struct AdviceChain {
    buckets: RwLock<Buckets>,
}

impl AdviceChain {
    /// New chain with no advice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append advice to the bucket matching its phase. O(1) amortized.
    pub fn add(&self, advice: Advice) {
        self.buckets.write().bucket_mut(advice.phase()).push(advice);
    }

    /// Run one phase against the context.
    ///
    /// Handlers run highest priority first; equal priorities keep their
    /// registration order (the sort is stable, which is a contract, not an
    /// implementation detail). The first handler error stops the phase and
    /// is returned; remaining handlers do not run.
    pub fn execute_phase(
        &self,
        phase: Phase,
        ctx: &mut InvocationContext,
    ) -> Result<(), AdviceError> {
        for advice in &self.snapshot(phase) {
            advice.run(ctx)?;
        }
        Ok(())
    }

    /// Whether any Around advice exists. The engine skips the Around phase
    /// entirely when this is false.
    pub fn has_around(&self) -> bool {
        !self.buckets.read().around.is_empty()
    }

    /// Total advice across all phases.
    pub fn count(&self) -> usize {
        self.buckets.read().total()
    }

    /// Advice in one phase.
    pub fn phase_count(&self, phase: Phase) -> usize {
        self.buckets.read().bucket(phase).len()
    }

    /// Clone the phase bucket and sort it into execution order.
    fn snapshot(&self, phase: Phase) -> Vec<Advice> {
        let mut batch = self.buckets.read().bucket(phase).clone();
        batch.sort_by(|a, b| b.priority().cmp(&a.priority()));
        batch
    }
}

impl fmt::Debug for AdviceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buckets = self.buckets.read();
        f.debug_struct("AdviceChain")
            .field("before", &buckets.before.len())
            .field("after", &buckets.after.len())
            .field("around", &buckets.around.len())
            .field("after_returning", &buckets.after_returning.len())
            .field("after_throwing", &buckets.after_throwing.len())
            .finish()
    }
}
