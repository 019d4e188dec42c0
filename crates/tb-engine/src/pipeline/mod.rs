//! Translate-once, execute-many controllers for software-pipelined loops.
//!
//! A controller consumes a packet stream and a [`PipelineState`], decides
//! which blocks the step executes and how often, and returns the updated
//! counters. Blocks labeled with a [`StageLabel`] are cached for the
//! controller's lifetime, so repeated outer iterations only re-execute them.

/// Marker location and stream classification.
pub mod layout;
/// Nested-loop controller.
pub mod nested;
/// Single-loop controller.
pub mod single;
/// Stage and loop counters.
pub mod state;

use crate::{
    BlockId, BlockLog, EngineError, ExecutePacket, StageLabel, TbCache, TraceEvent, TraceSink,
};

pub use self::state::{PipelineState, Stage};

/// One block's share of a controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BlockExecution {
    /// Executed block.
    pub block: BlockId,
    /// Stage label, `None` for the unlabeled single-loop prolog.
    pub label: Option<StageLabel>,
    /// Logical execution count.
    pub times: u32,
    /// `true` when this step translated the block, `false` on reuse.
    pub translated: bool,
}

/// Outcome of one controller step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StepReport {
    /// Counters after the step.
    pub state: PipelineState,
    /// Blocks executed by the step, in execution order.
    pub executions: Vec<BlockExecution>,
}

impl StepReport {
    /// Logical executions of loop-body blocks (everything but the overlap).
    #[must_use]
    pub fn body_executions(&self) -> u64 {
        self.executions
            .iter()
            .filter(|execution| execution.label != Some(StageLabel::Overlap))
            .map(|execution| u64::from(execution.times))
            .sum()
    }

    /// Blocks translated during this step.
    #[must_use]
    pub fn translated_blocks(&self) -> usize {
        self.executions
            .iter()
            .filter(|execution| execution.translated)
            .count()
    }

    fn record(&mut self, execution: BlockExecution, sink: &mut dyn TraceSink) {
        if !execution.translated {
            if let Some(label) = execution.label {
                sink.on_event(TraceEvent::BlockReused {
                    id: execution.block,
                    label,
                });
            }
        }
        sink.on_event(TraceEvent::BlockExecuted {
            id: execution.block,
            times: execution.times,
        });
        self.executions.push(execution);
    }
}

/// Every step of a run driven to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunSummary {
    /// Step reports in order.
    pub steps: Vec<StepReport>,
}

impl RunSummary {
    /// Counters after the last step.
    #[must_use]
    pub fn final_state(&self) -> Option<PipelineState> {
        self.steps.last().map(|step| step.state)
    }

    /// Loop-body executions over all steps.
    #[must_use]
    pub fn body_executions(&self) -> u64 {
        self.steps.iter().map(StepReport::body_executions).sum()
    }

    /// Blocks translated over all steps.
    #[must_use]
    pub fn translated_blocks(&self) -> usize {
        self.steps.iter().map(StepReport::translated_blocks).sum()
    }
}

/// Shared surface of the loop controllers.
pub trait LoopController {
    /// Runs one step from `state` and returns the new counters.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ErrorClass::Structure`] error when the loop markers
    /// cannot be located in `packets`.
    fn step(
        &mut self,
        packets: &[ExecutePacket],
        state: PipelineState,
        sink: &mut dyn TraceSink,
    ) -> Result<StepReport, EngineError>;

    /// Returns `true` when `state`, as returned by a step, ends the run.
    fn is_complete(&self, state: &PipelineState) -> bool;

    /// Every block this controller has translated, in id order.
    fn blocks(&self) -> &BlockLog;

    /// Stage-labeled blocks this controller has cached.
    fn cache(&self) -> &TbCache;

    /// Steps from `state` until the run completes.
    ///
    /// # Errors
    ///
    /// Propagates the first failing step.
    fn run(
        &mut self,
        packets: &[ExecutePacket],
        state: PipelineState,
        sink: &mut dyn TraceSink,
    ) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary::default();
        let mut state = state;
        loop {
            let report = self.step(packets, state, sink)?;
            state = report.state;
            let stalled = report.executions.is_empty();
            summary.steps.push(report);
            if stalled || self.is_complete(&state) {
                return Ok(summary);
            }
        }
    }
}

fn change_stage(state: &mut PipelineState, to: Stage, sink: &mut dyn TraceSink) {
    if state.stage != to {
        sink.on_event(TraceEvent::StageChanged {
            from: state.stage,
            to,
        });
        state.stage = to;
    }
}

fn complete(state: &mut PipelineState, log: &BlockLog, sink: &mut dyn TraceSink) {
    change_stage(state, Stage::Prolog, sink);
    *state = PipelineState::idle();
    sink.on_event(TraceEvent::LoopCompleted {
        translated_blocks: log.len(),
    });
}
