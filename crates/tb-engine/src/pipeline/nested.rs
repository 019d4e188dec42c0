use super::layout::LoopLayout;
use super::{
    change_stage, complete, BlockExecution, LoopController, PipelineState, Stage, StepReport,
};
use crate::trace::GatedSink;
use crate::{
    BlockLog, CycleBudget, EngineConfig, EngineError, ExecutePacket, StageLabel, TbCache,
    TraceSink, TranslationBlock,
};

/// Controller for an inner software-pipelined loop nested in an outer loop.
///
/// One step covers one outer iteration. The first step translates the
/// prolog and kernel blocks; later steps translate the overlap block once
/// and re-execute all three from the cache, so a whole run translates at
/// most three blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedLoopController {
    config: EngineConfig,
    log: BlockLog,
    cache: TbCache,
}

impl NestedLoopController {
    /// Controller with an empty cache.
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self {
            config,
            log: BlockLog::new(),
            cache: TbCache::new(),
        }
    }

    fn execute_cached(
        &mut self,
        label: StageLabel,
        packets: &[ExecutePacket],
        indices: impl FnOnce() -> Result<Vec<usize>, EngineError>,
        times: u32,
        report: &mut StepReport,
        sink: &mut dyn TraceSink,
    ) -> Result<(), EngineError> {
        let config = self.config;
        let outcome = self.cache.get_or_translate(label, &mut self.log, |id| {
            Ok(TranslationBlock::from_indices(
                id,
                Some(label),
                CycleBudget::Unbounded,
                packets,
                indices()?,
                &config,
                sink,
            ))
        })?;
        report.record(
            BlockExecution {
                block: outcome.id(),
                label: Some(label),
                times,
                translated: !outcome.was_reused(),
            },
            sink,
        );
        Ok(())
    }

    fn prolog_and_kernel(
        &mut self,
        packets: &[ExecutePacket],
        layout: &LoopLayout,
        state: &mut PipelineState,
        report: &mut StepReport,
        sink: &mut dyn TraceSink,
    ) -> Result<(), EngineError> {
        self.execute_cached(
            StageLabel::Prolog,
            packets,
            || Ok(layout.prolog_indices()),
            1,
            report,
            sink,
        )?;
        state.inner_count = state.inner_count.saturating_sub(1);
        self.kernel(packets, layout, state, report, sink)
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
            self.execute_cached(
                StageLabel::Kernel,
                packets,
                || Ok(layout.kernel_indices().to_vec()),
                state.inner_count,
                report,
                sink,
            )?;
        }
        state.inner_count = state.reload_count;
        state.outer_count = state.outer_count.saturating_sub(1);
        if state.outer_count > 0 {
            change_stage(state, Stage::Overlap, sink);
        } else {
            complete(state, &self.log, sink);
        }
        Ok(())
    }
}

impl LoopController for NestedLoopController {
    /// A `Prolog` state with no outer iterations left is returned unchanged.
    /// A `Kernel` entry state resumes with the pending kernel iterations.
    fn step(
        &mut self,
        packets: &[ExecutePacket],
        state: PipelineState,
        sink: &mut dyn TraceSink,
    ) -> Result<StepReport, EngineError> {
        let mut report = StepReport {
            state,
            executions: Vec::new(),
        };
        if self.is_complete(&state) {
            return Ok(report);
        }

        let mut sink = GatedSink::new(sink, self.config.tracing_enabled);
        let layout = LoopLayout::locate(packets)?;
        layout.require_branch_back()?;
        let mut state = state;

        match state.stage {
            Stage::Prolog => {
                self.prolog_and_kernel(packets, &layout, &mut state, &mut report, &mut sink)?;
            }
            Stage::Kernel => {
                self.kernel(packets, &layout, &mut state, &mut report, &mut sink)?;
            }
            Stage::Overlap => {
                self.execute_cached(
                    StageLabel::Overlap,
                    packets,
                    || layout.overlap_indices(),
                    1,
                    &mut report,
                    &mut sink,
                )?;
                self.prolog_and_kernel(packets, &layout, &mut state, &mut report, &mut sink)?;
            }
        }

        report.state = state;
        Ok(report)
    }

    fn is_complete(&self, state: &PipelineState) -> bool {
        state.stage == Stage::Prolog && state.outer_count == 0
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
    use super::NestedLoopController;
    use crate::fixtures::{
        nested_loop_program, NESTED_INNER_ITERATIONS, NESTED_OUTER_ITERATIONS,
        NESTED_RELOAD_ITERATIONS,
    };
    use crate::{
        EngineConfig, EngineError, Instruction, InstructionKind, LoopController, NoopTraceSink,
        PacketStream, PipelineState, Stage, StageLabel,
    };

    fn reference_state() -> PipelineState {
        PipelineState::nested(
            NESTED_INNER_ITERATIONS,
            NESTED_RELOAD_ITERATIONS,
            NESTED_OUTER_ITERATIONS,
        )
    }

    #[test]
    fn first_step_translates_prolog_and_kernel() {
        let program = nested_loop_program().expect("fixture");
        let mut controller = NestedLoopController::new(EngineConfig::default());
        let report = controller
            .step(program.as_slice(), reference_state(), &mut NoopTraceSink)
            .expect("step");

        assert_eq!(report.state.stage, Stage::Overlap);
        assert_eq!(report.state.inner_count, NESTED_RELOAD_ITERATIONS);
        assert_eq!(report.state.outer_count, NESTED_OUTER_ITERATIONS - 1);
        let labels: Vec<_> = report.executions.iter().map(|e| (e.label, e.times)).collect();
        assert_eq!(
            labels,
            vec![
                (Some(StageLabel::Prolog), 1),
                (Some(StageLabel::Kernel), NESTED_INNER_ITERATIONS - 1),
            ]
        );

        let prolog = controller.blocks().get(report.executions[0].block).expect("prolog");
        assert_eq!(prolog.packet_indices(), &[0, 1, 2, 3, 4, 5]);
        let kernel = controller.blocks().get(report.executions[1].block).expect("kernel");
        assert_eq!(kernel.packet_indices(), &[6, 7, 8, 9]);
    }

    #[test]
    fn overlap_step_translates_only_the_overlap() {
        let program = nested_loop_program().expect("fixture");
        let mut controller = NestedLoopController::new(EngineConfig::default());
        let first = controller
            .step(program.as_slice(), reference_state(), &mut NoopTraceSink)
            .expect("first step");
        let second = controller
            .step(program.as_slice(), first.state, &mut NoopTraceSink)
            .expect("second step");

        assert_eq!(second.translated_blocks(), 1);
        assert_eq!(second.executions[0].label, Some(StageLabel::Overlap));
        assert!(second.executions[1..].iter().all(|e| !e.translated));
        let overlap = controller.blocks().get(second.executions[0].block).expect("overlap");
        assert_eq!(overlap.start_index(), 10);
        assert_eq!(overlap.end_index(), Some(program.len() - 1));
    }

    #[test]
    fn reference_run_completes_with_three_blocks() {
        let program = nested_loop_program().expect("fixture");
        let mut controller = NestedLoopController::new(EngineConfig::default());
        let summary = controller
            .run(program.as_slice(), reference_state(), &mut NoopTraceSink)
            .expect("run");

        assert_eq!(summary.steps.len(), 3);
        assert_eq!(summary.final_state(), Some(PipelineState::idle()));
        assert_eq!(controller.blocks().len(), 3);
        assert_eq!(
            summary.body_executions(),
            u64::from(NESTED_INNER_ITERATIONS * NESTED_OUTER_ITERATIONS)
        );
    }

    #[test]
    fn completed_state_is_a_no_op() {
        let program = nested_loop_program().expect("fixture");
        let mut controller = NestedLoopController::new(EngineConfig::default());
        let state = PipelineState::nested(5, 5, 0);
        let report = controller
            .step(program.as_slice(), state, &mut NoopTraceSink)
            .expect("step");
        assert_eq!(report.state, state);
        assert!(report.executions.is_empty());
        assert!(controller.blocks().is_empty());
    }

    #[test]
    fn single_inner_iteration_skips_kernel() {
        let program = nested_loop_program().expect("fixture");
        let mut controller = NestedLoopController::new(EngineConfig::default());
        let report = controller
            .step(program.as_slice(), PipelineState::nested(1, 1, 2), &mut NoopTraceSink)
            .expect("step");
        assert_eq!(report.executions.len(), 1);
        assert_eq!(report.state.stage, Stage::Overlap);
        assert_eq!(report.state.inner_count, 1);
        assert_eq!(controller.cache().lookup(StageLabel::Kernel), None);
    }

    #[test]
    fn kernel_without_branch_back_is_unresolved() {
        let mut stream = PacketStream::new();
        let start = Instruction::builder(InstructionKind::LoopStart, "SPLOOP")
            .build()
            .expect("sploop");
        let load = Instruction::builder(InstructionKind::Load, "LDW")
            .build()
            .expect("ldw");
        stream.push(1, vec![start]).expect("packet");
        stream.push(1, vec![load]).expect("packet");
        let mut controller = NestedLoopController::new(EngineConfig::default());
        assert_eq!(
            controller.step(stream.as_slice(), PipelineState::nested(2, 2, 2), &mut NoopTraceSink),
            Err(EngineError::UnresolvedLoopMarker { start_index: 1 })
        );
    }
}
