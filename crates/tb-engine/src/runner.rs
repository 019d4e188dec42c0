use crate::trace::GatedSink;
use crate::{
    form_block, BlockLog, CycleBudget, DelayContext, DelayTracker, EngineConfig, ExecutePacket,
    TraceSink,
};

/// Blocks produced by a straight-line run and the delays still owed at its end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StraightLineRun {
    /// Every block formed, in stream order.
    pub blocks: BlockLog,
    /// Delay contexts still live after the last block.
    pub live_contexts: Vec<DelayContext>,
}

impl StraightLineRun {
    /// Budget each block was formed under, in order.
    #[must_use]
    pub fn budgets(&self) -> Vec<CycleBudget> {
        self.blocks.iter().map(|block| block.cycle_budget()).collect()
    }
}

const fn usable(budget: CycleBudget) -> CycleBudget {
    match budget {
        CycleBudget::Cycles(0) => CycleBudget::Unbounded,
        other => other,
    }
}

/// Partitions the whole stream into consecutive blocks.
///
/// The first block is formed under `config.initial_budget`; every later one
/// under the budget derived from the delay contexts left so far. A zero
/// budget means the owed branch resolves at the boundary and is treated as
/// unbounded.
pub fn translate_straight_line(
    packets: &[ExecutePacket],
    config: &EngineConfig,
    sink: &mut dyn TraceSink,
) -> StraightLineRun {
    let mut sink = GatedSink::new(sink, config.tracing_enabled);
    let mut blocks = BlockLog::new();
    let mut tracker = DelayTracker::new();
    let mut budget = usable(config.initial_budget);
    let mut index = 0;

    while index < packets.len() {
        let formed = form_block(packets, index, budget, blocks.next_id(), config, &mut sink);
        index = formed.block.next_index();
        tracker.record(formed.contexts);
        blocks.push(formed.block);
        budget = usable(tracker.take_next_budget(&mut sink));
    }

    StraightLineRun {
        blocks,
        live_contexts: tracker.into_contexts(),
    }
}
