//! Structured decision events and the sink trait that receives them.

use crate::{BlockId, CycleBudget, Stage, StageLabel};

/// Decision event emitted by the engine in the order decisions are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TraceEvent {
    /// A store was moved behind the non-store instructions of its packet.
    StoreDeferred {
        /// Sequence of the packet being translated.
        sequence: u32,
        /// Listing line of the deferred store.
        source_line: u32,
    },
    /// A branch delay obligation was recorded during formation.
    DelayContextSaved {
        /// Sequence of the packet holding the branch.
        sequence: u32,
        /// Listing line of the branch.
        origin_line: u32,
        /// Delay slots still owed by the branch.
        remaining_delay: u32,
    },
    /// The remaining budget was capped by a branch's delay slots.
    BudgetClipped {
        /// Sequence of the packet holding the branch.
        sequence: u32,
        /// New remaining budget in cycles.
        remaining: u32,
    },
    /// A packet did not fit the remaining budget and starts the next block.
    PacketDoesNotFit {
        /// Sequence of the rejected packet.
        sequence: u32,
        /// Cycle cost of the rejected packet.
        cycle_cost: u32,
        /// Budget left when the packet was considered.
        remaining: u32,
    },
    /// The remaining budget reached zero after a packet.
    BudgetExhausted {
        /// Sequence of the last packet admitted.
        sequence: u32,
    },
    /// A translation block was closed.
    BlockFormed {
        /// Identifier of the new block.
        id: BlockId,
        /// Stage label, `None` for unlabeled blocks.
        label: Option<StageLabel>,
        /// First stream index covered.
        start_index: usize,
        /// Last stream index covered, `None` for an empty block.
        end_index: Option<usize>,
        /// Number of packets in the block.
        packets: usize,
        /// Budget the block was formed under.
        budget: CycleBudget,
    },
    /// The budget for the next block was derived from live delay contexts.
    NextBudgetDerived {
        /// Derived budget.
        budget: CycleBudget,
        /// Contexts still live after pruning.
        live_contexts: usize,
        /// Contexts dropped by the prune.
        pruned: usize,
    },
    /// A cached block was found for a stage label.
    BlockReused {
        /// Reused block.
        id: BlockId,
        /// Stage label it is cached under.
        label: StageLabel,
    },
    /// A block was reported as executed one or more times.
    BlockExecuted {
        /// Executed block.
        id: BlockId,
        /// Logical execution count.
        times: u32,
    },
    /// A loop controller changed pipeline stage.
    StageChanged {
        /// Previous stage.
        from: Stage,
        /// New stage.
        to: Stage,
    },
    /// A loop controller finished its run and reset its counters.
    LoopCompleted {
        /// Blocks the controller has translated so far.
        translated_blocks: usize,
    },
}

/// Sink trait for decision trace hooks.
pub trait TraceSink {
    /// Records an event in decision order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn on_event(&mut self, _event: TraceEvent) {}
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Forwards events to an inner sink only while tracing is enabled.
///
/// Every engine entry point wraps its caller's sink in one, keyed on
/// [`crate::EngineConfig::tracing_enabled`].
pub struct GatedSink<'a> {
    inner: &'a mut dyn TraceSink,
    enabled: bool,
}

impl<'a> GatedSink<'a> {
    /// Wraps `inner`; events are dropped unless `enabled`.
    #[must_use]
    pub fn new(inner: &'a mut dyn TraceSink, enabled: bool) -> Self {
        Self { inner, enabled }
    }
}

impl TraceSink for GatedSink<'_> {
    fn on_event(&mut self, event: TraceEvent) {
        if self.enabled {
            self.inner.on_event(event);
        }
    }
}
