//! Cycle-budgeted translation-block formation.
//!
//! [`form_block`] greedily appends packets from a start index while the
//! remaining cycle budget is positive. Every branch caps the remaining budget
//! at its delay-slot count, so a block never runs past the point where an
//! in-flight branch would redirect control. Each branch also leaves a
//! [`DelayContext`] behind, from which the caller derives the budget of the
//! following block.

use std::fmt;

use crate::trace::GatedSink;
use crate::{
    translate_packet, DelayContext, EngineConfig, ExecutePacket, StageLabel, TraceEvent,
    TraceSink,
};

/// Identifier of a translation block: its position in the [`BlockLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BlockId(u32);

impl BlockId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Position in the block log.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TB{}", self.0)
    }
}

/// Cycle allowance a block is formed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CycleBudget {
    /// No limit until a branch caps it.
    #[default]
    Unbounded,
    /// Finite number of cycles.
    Cycles(u32),
}

impl CycleBudget {
    /// Returns `true` for [`CycleBudget::Unbounded`].
    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Finite cycle count, `None` when unbounded.
    #[must_use]
    pub const fn cycles(self) -> Option<u32> {
        match self {
            Self::Unbounded => None,
            Self::Cycles(cycles) => Some(cycles),
        }
    }
}

impl fmt::Display for CycleBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("unbounded"),
            Self::Cycles(cycles) => write!(f, "{cycles} cycles"),
        }
    }
}

/// Ordered packets translated as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TranslationBlock {
    id: BlockId,
    label: Option<StageLabel>,
    cycle_budget: CycleBudget,
    start_index: usize,
    packet_indices: Vec<usize>,
    packets: Vec<ExecutePacket>,
}

impl TranslationBlock {
    /// Builds a block over explicit stream indices, translating each packet
    /// when `config.defer_stores` is set.
    pub(crate) fn from_indices(
        id: BlockId,
        label: Option<StageLabel>,
        cycle_budget: CycleBudget,
        source: &[ExecutePacket],
        packet_indices: Vec<usize>,
        config: &EngineConfig,
        sink: &mut dyn TraceSink,
    ) -> Self {
        let start_index = packet_indices.first().copied().unwrap_or(source.len());
        let packets = packet_indices
            .iter()
            .filter_map(|&index| source.get(index))
            .map(|packet| admit(packet, config, sink))
            .collect();
        let block = Self {
            id,
            label,
            cycle_budget,
            start_index,
            packet_indices,
            packets,
        };
        block.announce(sink);
        block
    }

    fn announce(&self, sink: &mut dyn TraceSink) {
        sink.on_event(TraceEvent::BlockFormed {
            id: self.id,
            label: self.label,
            start_index: self.start_index,
            end_index: self.end_index(),
            packets: self.packets.len(),
            budget: self.cycle_budget,
        });
    }

    /// Block identifier.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Stage label, `None` for unlabeled blocks.
    #[must_use]
    pub const fn label(&self) -> Option<StageLabel> {
        self.label
    }

    /// Budget the block was formed under.
    #[must_use]
    pub const fn cycle_budget(&self) -> CycleBudget {
        self.cycle_budget
    }

    /// First stream index covered (the requested start for an empty block).
    #[must_use]
    pub const fn start_index(&self) -> usize {
        self.start_index
    }

    /// Last stream index covered, `None` for an empty block.
    #[must_use]
    pub fn end_index(&self) -> Option<usize> {
        self.packet_indices.last().copied()
    }

    /// Stream index the following block starts at.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.end_index().map_or(self.start_index, |end| end + 1)
    }

    /// Stream index of every packet in the block.
    #[must_use]
    pub fn packet_indices(&self) -> &[usize] {
        &self.packet_indices
    }

    /// Translated packets in source order.
    #[must_use]
    pub fn packets(&self) -> &[ExecutePacket] {
        &self.packets
    }

    /// Number of packets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Returns `true` when the block covers no packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Sum of the packets' cycle costs.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.packets
            .iter()
            .map(|packet| u64::from(packet.cycle_cost()))
            .sum()
    }
}

/// A freshly formed block and the delay obligations its branches left open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormedBlock {
    /// The block.
    pub block: TranslationBlock,
    /// One context per branch in the block, in issue order.
    pub contexts: Vec<DelayContext>,
}

fn admit(packet: &ExecutePacket, config: &EngineConfig, sink: &mut dyn TraceSink) -> ExecutePacket {
    if config.defer_stores {
        translate_packet(packet, sink)
    } else {
        packet.clone()
    }
}

fn clamp_to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Forms one block starting at `start_index` under `budget`.
///
/// A start index past the end of `packets` yields an empty block. A packet
/// whose cost exceeds a finite remaining budget ends the block unless the
/// block is still empty, in which case it is admitted alone.
pub fn form_block(
    packets: &[ExecutePacket],
    start_index: usize,
    budget: CycleBudget,
    id: BlockId,
    config: &EngineConfig,
    sink: &mut dyn TraceSink,
) -> FormedBlock {
    let mut sink = GatedSink::new(sink, config.tracing_enabled);
    let mut remaining: Option<i64> = budget.cycles().map(i64::from);
    let mut indices = Vec::new();
    let mut translated = Vec::new();
    let mut contexts = Vec::new();
    let mut index = start_index;

    while let Some(packet) = packets.get(index) {
        if remaining.is_some_and(|left| left <= 0) {
            break;
        }
        let cost = i64::from(packet.cycle_cost());
        if let Some(left) = remaining {
            if cost > left && !indices.is_empty() {
                sink.on_event(TraceEvent::PacketDoesNotFit {
                    sequence: packet.sequence(),
                    cycle_cost: packet.cycle_cost(),
                    remaining: clamp_to_u32(left),
                });
                break;
            }
        }

        let min_delay = packet.min_branch_delay();
        indices.push(index);
        translated.push(admit(packet, config, &mut sink));
        for branch in packet.branches() {
            let context = DelayContext::from_branch(branch);
            sink.on_event(TraceEvent::DelayContextSaved {
                sequence: packet.sequence(),
                origin_line: context.origin_line,
                remaining_delay: context.remaining_delay,
            });
            contexts.push(context);
        }

        remaining = remaining.map(|left| left - cost);
        index += 1;

        if let Some(delay) = min_delay.map(i64::from) {
            if remaining.is_none_or(|left| delay < left) {
                remaining = Some(delay);
                sink.on_event(TraceEvent::BudgetClipped {
                    sequence: packet.sequence(),
                    remaining: clamp_to_u32(delay),
                });
            }
        }

        if remaining.is_some_and(|left| left <= 0) {
            sink.on_event(TraceEvent::BudgetExhausted {
                sequence: packet.sequence(),
            });
            break;
        }
    }

    let block = TranslationBlock {
        id,
        label: None,
        cycle_budget: budget,
        start_index,
        packet_indices: indices,
        packets: translated,
    };
    block.announce(&mut sink);
    FormedBlock { block, contexts }
}

/// Append-only, id-ordered collection of every block produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BlockLog {
    blocks: Vec<TranslationBlock>,
}

impl BlockLog {
    /// Empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Identifier the next pushed block must carry.
    #[must_use]
    pub fn next_id(&self) -> BlockId {
        BlockId::new(u32::try_from(self.blocks.len()).unwrap_or(u32::MAX))
    }

    /// Appends a block formed with [`BlockLog::next_id`] and returns its id.
    pub fn push(&mut self, block: TranslationBlock) -> BlockId {
        debug_assert_eq!(block.id(), self.next_id(), "block ids follow log order");
        let id = block.id();
        self.blocks.push(block);
        id
    }

    /// Looks a block up by id.
    #[must_use]
    pub fn get(&self, id: BlockId) -> Option<&TranslationBlock> {
        self.blocks.get(id.index())
    }

    /// Blocks in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, TranslationBlock> {
        self.blocks.iter()
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` when no block has been produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Most recently pushed block.
    #[must_use]
    pub fn last(&self) -> Option<&TranslationBlock> {
        self.blocks.last()
    }
}

impl<'a> IntoIterator for &'a BlockLog {
    type Item = &'a TranslationBlock;
    type IntoIter = std::slice::Iter<'a, TranslationBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
