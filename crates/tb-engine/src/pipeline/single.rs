use super::layout::LoopLayout;
use super::{
    change_stage, complete, BlockExecution, LoopController, PipelineState, Stage, StepReport,
};
use crate::trace::GatedSink;
use crate::{
    BlockLog, CycleBudget, EngineConfig, EngineError, ExecutePacket, StageLabel, TbCache,
    TraceSink, TranslationBlock,
};

/// Controller for a single software-pipelined loop.
///
/// One step covers a whole loop invocation: the prolog block is translated
/// over the entire body and executed once, then the kernel block is
/// translated on first use and credited with the remaining iterations.
/// Exactly two blocks are translated per invocation regardless of the
/// iteration count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleLoopController {
    config: EngineConfig,
    log: BlockLog,
    cache: TbCache,
}

impl SingleLoopController {
    /// Controller with an empty cache.
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self {
            config,
            log: BlockLog::new(),
            cache: TbCache::new(),
        }
    }

    fn prolog(
        &mut self,
        packets: &[ExecutePacket],
        state: &mut PipelineState,
        report: &mut StepReport,
        sink: &mut dyn TraceSink,
    ) {
        let id = self.log.next_id();
        let block = TranslationBlock::from_indices(
            id,
            None,
            CycleBudget::Unbounded,
            packets,
            (0..packets.len()).collect(),
            &self.config,
            sink,
        );
        self.log.push(block);
        report.record(
            BlockExecution {
                block: id,
                label: None,
                times: 1,
                translated: true,
            },
            sink,
        );
        state.inner_count = state.inner_count.saturating_sub(1);
    }

    fn kernel(
        &mut self,
        packets: &[ExecutePacket],
        layout: &LoopLayout,
        state: &mut PipelineState,
        report: &mut StepReport,
        sink: &mut dyn TraceSink,
    ) -> Result<(), EngineError> {
        if state.inner_count > 0 {
            change_stage(state, Stage::Kernel, sink);
            let config = self.config;
            let outcome = self
                .cache
                .get_or_translate(StageLabel::Kernel, &mut self.log, |id| {
                    Ok(TranslationBlock::from_indices(
                        id,
                        Some(StageLabel::Kernel),
                        CycleBudget::Unbounded,
                        packets,
                        layout.body_indices(),
                        &config,
                        sink,
                    ))
                })?;
            report.record(
                BlockExecution {
                    block: outcome.id(),
                    label: Some(StageLabel::Kernel),
                    times: state.inner_count,
                    translated: !outcome.was_reused(),
                },
                sink,
            );
            state.inner_count = 0;
        }
        complete(state, &self.log, sink);
        Ok(())
    }
}

impl LoopController for SingleLoopController {
    /// A `Kernel` entry state resumes with the pending kernel iterations;
    /// any other stage starts a fresh invocation from the prolog.
    fn step(
        &mut self,
        packets: &[ExecutePacket],
        state: PipelineState,
        sink: &mut dyn TraceSink,
    ) -> Result<StepReport, EngineError> {
        let mut sink = GatedSink::new(sink, self.config.tracing_enabled);
        let layout = LoopLayout::locate(packets)?;
        let mut state = state;
        let mut report = StepReport::default();

        if state.stage != Stage::Kernel {
            self.prolog(packets, &mut state, &mut report, &mut sink);
        }
        self.kernel(packets, &layout, &mut state, &mut report, &mut sink)?;

        report.state = state;
        Ok(report)
    }

    fn is_complete(&self, state: &PipelineState) -> bool {
        state.stage == Stage::Prolog && state.inner_count == 0
    }

    fn blocks(&self) -> &BlockLog {
        &self.log
    }

    fn cache(&self) -> &TbCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::SingleLoopController;
    use crate::fixtures::{single_loop_program, SINGLE_LOOP_ITERATIONS};
    use crate::{
        EngineConfig, EngineError, Instruction, InstructionKind, LoopController, NoopTraceSink,
        PacketStream, PipelineState, Stage, StageLabel, TraceEvent,
    };

    #[test]
    fn reference_loop_translates_two_blocks() {
        let program = single_loop_program().expect("fixture");
        let mut controller = SingleLoopController::new(EngineConfig::default());
        let report = controller
            .step(
                program.as_slice(),
                PipelineState::single(SINGLE_LOOP_ITERATIONS),
                &mut NoopTraceSink,
            )
            .expect("step");

        assert_eq!(report.state, PipelineState::idle());
        assert_eq!(controller.blocks().len(), 2);
        assert_eq!(report.body_executions(), u64::from(SINGLE_LOOP_ITERATIONS));
        let kernel = &report.executions[1];
        assert_eq!(kernel.label, Some(StageLabel::Kernel));
        assert_eq!(kernel.times, SINGLE_LOOP_ITERATIONS - 1);

        let kernel_block = controller.blocks().get(kernel.block).expect("kernel block");
        assert_eq!(kernel_block.packet_indices(), &[4, 5, 6, 7]);
        let prolog_block = controller.blocks().get(report.executions[0].block).expect("prolog");
        assert_eq!(prolog_block.len(), program.len());
        assert_eq!(prolog_block.label(), None);
    }

    #[test]
    fn single_iteration_skips_kernel() {
        let program = single_loop_program().expect("fixture");
        let mut controller = SingleLoopController::new(EngineConfig::default());
        let report = controller
            .step(program.as_slice(), PipelineState::single(1), &mut NoopTraceSink)
            .expect("step");
        assert_eq!(report.executions.len(), 1);
        assert_eq!(report.state, PipelineState::idle());
        assert!(controller.cache().is_empty());
    }

    #[test]
    fn zero_iterations_still_issue_the_prolog_once() {
        let program = single_loop_program().expect("fixture");
        let mut controller = SingleLoopController::new(EngineConfig::default());
        let report = controller
            .step(program.as_slice(), PipelineState::single(0), &mut NoopTraceSink)
            .expect("step");
        assert_eq!(report.body_executions(), 1);
        assert_eq!(report.state.inner_count, 0);
    }

    #[test]
    fn second_invocation_reuses_kernel() {
        let program = single_loop_program().expect("fixture");
        let mut controller = SingleLoopController::new(EngineConfig::default());
        let mut events: Vec<TraceEvent> = Vec::new();
        for _ in 0..2 {
            controller
                .step(program.as_slice(), PipelineState::single(4), &mut events)
                .expect("step");
        }
        assert_eq!(controller.blocks().len(), 3);
        assert_eq!(controller.cache().len(), 1);
        assert!(events.iter().any(|event| matches!(
            event,
            TraceEvent::BlockReused {
                label: StageLabel::Kernel,
                ..
            }
        )));
    }

    #[test]
    fn kernel_entry_state_resumes_pending_iterations() {
        let program = single_loop_program().expect("fixture");
        let mut controller = SingleLoopController::new(EngineConfig::default());
        let state = PipelineState {
            stage: Stage::Kernel,
            ..PipelineState::single(3)
        };
        let report = controller
            .step(program.as_slice(), state, &mut NoopTraceSink)
            .expect("step");
        assert_eq!(report.executions.len(), 1);
        assert_eq!(report.executions[0].times, 3);
    }

    #[test]
    fn stream_without_loop_start_is_rejected() {
        let mut stream = PacketStream::new();
        let nop = Instruction::builder(InstructionKind::NoOp, "NOP")
            .build()
            .expect("nop");
        stream.push(1, vec![nop]).expect("packet");
        let mut controller = SingleLoopController::new(EngineConfig::default());
        assert_eq!(
            controller.step(stream.as_slice(), PipelineState::single(2), &mut NoopTraceSink),
            Err(EngineError::MissingLoopStart)
        );
        assert!(controller.blocks().is_empty());
    }
}
