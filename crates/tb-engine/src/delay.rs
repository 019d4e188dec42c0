//! Branch delay obligations that outlive the block that issued them.

use crate::{CycleBudget, Instruction, TraceEvent, TraceSink};

/// Delay slots still owed by a branch at a block boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DelayContext {
    /// Delay slots remaining.
    pub remaining_delay: u32,
    /// Branch operand text, kept for diagnostics.
    pub target: String,
    /// Listing line of the branch.
    pub origin_line: u32,
}

impl DelayContext {
    /// Captures the full delay of `branch`.
    #[must_use]
    pub fn from_branch(branch: &Instruction) -> Self {
        Self {
            remaining_delay: branch.delay_slots(),
            target: branch.operands().to_owned(),
            origin_line: branch.source_line(),
        }
    }

    /// A context is live while it still owes delay slots.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.remaining_delay > 0
    }
}

/// Budget for the next block: the smallest live delay, or unbounded.
#[must_use]
pub fn next_budget(contexts: &[DelayContext]) -> CycleBudget {
    contexts
        .iter()
        .filter(|context| context.is_live())
        .map(|context| context.remaining_delay)
        .min()
        .map_or(CycleBudget::Unbounded, CycleBudget::Cycles)
}

/// Drops every context that no longer owes delay slots.
#[must_use]
pub fn prune(mut contexts: Vec<DelayContext>) -> Vec<DelayContext> {
    contexts.retain(DelayContext::is_live);
    contexts
}

/// Owns the live delay contexts of a straight-line run.
///
/// Delays are never decremented here; they only leave the set through
/// [`DelayTracker::prune`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelayTracker {
    contexts: Vec<DelayContext>,
}

impl DelayTracker {
    /// Empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            contexts: Vec::new(),
        }
    }

    /// Adds the contexts produced by a freshly formed block.
    pub fn record(&mut self, contexts: impl IntoIterator<Item = DelayContext>) {
        self.contexts.extend(contexts);
    }

    /// Budget derived from the current set.
    #[must_use]
    pub fn next_budget(&self) -> CycleBudget {
        next_budget(&self.contexts)
    }

    /// Prunes dead contexts and returns how many were dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.contexts.len();
        self.contexts.retain(DelayContext::is_live);
        before - self.contexts.len()
    }

    /// Derives the next budget, then prunes.
    pub fn take_next_budget(&mut self, sink: &mut dyn TraceSink) -> CycleBudget {
        let budget = self.next_budget();
        let pruned = self.prune();
        sink.on_event(TraceEvent::NextBudgetDerived {
            budget,
            live_contexts: self.contexts.len(),
            pruned,
        });
        budget
    }

    /// Contexts currently held.
    #[must_use]
    pub fn live(&self) -> &[DelayContext] {
        &self.contexts
    }

    /// Number of contexts held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns `true` when no context is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Consumes the tracker.
    #[must_use]
    pub fn into_contexts(self) -> Vec<DelayContext> {
        self.contexts
    }
}
