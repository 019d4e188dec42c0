//! Translation-block formation engine for a VLIW dynamic binary translator.

/// Instruction and execute-packet data model.
pub mod packet;
pub use packet::{
    ExecutePacket, Instruction, InstructionBuilder, InstructionKind, PacketStream,
    DEFAULT_BRANCH_DELAY_SLOTS,
};

/// Error taxonomy for packet construction and loop layout.
pub mod error;
pub use error::{EngineError, ErrorClass};

/// Decision trace events and sinks.
pub mod trace;
pub use trace::{GatedSink, NoopTraceSink, TraceEvent, TraceSink};

/// Engine configuration.
pub mod config;
pub use config::EngineConfig;

/// Store-deferral packet translation.
pub mod translate;
pub use translate::{translate_packet, CANONICAL_STORE_MNEMONIC};

/// Cycle-budgeted block formation and the block log.
pub mod block;
pub use block::{form_block, BlockId, BlockLog, CycleBudget, FormedBlock, TranslationBlock};

/// Branch delay contexts carried across block boundaries.
pub mod delay;
pub use delay::{next_budget, prune, DelayContext, DelayTracker};

/// Stage-labeled block cache.
pub mod cache;
pub use cache::{CacheOutcome, StageLabel, TbCache, STAGE_LABEL_COUNT};

/// Software-pipelined loop controllers.
pub mod pipeline;
pub use pipeline::layout::{classify, LoopLayout, StreamShape};
pub use pipeline::nested::NestedLoopController;
pub use pipeline::single::SingleLoopController;
pub use pipeline::{BlockExecution, LoopController, PipelineState, RunSummary, Stage, StepReport};

/// Whole-stream straight-line translation.
pub mod runner;
pub use runner::{translate_straight_line, StraightLineRun};

/// Reference guest programs.
pub mod fixtures;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
