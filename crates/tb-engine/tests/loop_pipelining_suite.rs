//! Software-pipelined loop controllers: translate-once, execute-many coverage.

#![allow(clippy::pedantic, clippy::nursery)]

use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use tb_engine::fixtures::{
    nested_loop_program, single_loop_program, NESTED_INNER_ITERATIONS, NESTED_OUTER_ITERATIONS,
    NESTED_RELOAD_ITERATIONS, SINGLE_LOOP_ITERATIONS,
};
use tb_engine::{
    classify, EngineConfig, LoopController, NestedLoopController, NoopTraceSink, PipelineState,
    SingleLoopController, Stage, StageLabel, StepReport, StreamShape, TraceEvent,
    CANONICAL_STORE_MNEMONIC,
};
use thiserror as _;

#[test]
fn single_loop_reference_run() {
    let program = single_loop_program().expect("fixture");
    assert_eq!(classify(program.as_slice()), StreamShape::SingleLoop);

    let mut controller = SingleLoopController::new(EngineConfig::default());
    let report = controller
        .step(
            program.as_slice(),
            PipelineState::single(SINGLE_LOOP_ITERATIONS),
            &mut NoopTraceSink,
        )
        .expect("step");

    assert_eq!(report.state.stage, Stage::Prolog);
    assert_eq!(report.state.inner_count, 0);
    assert_eq!(controller.blocks().len(), 2);
    assert_eq!(report.body_executions(), 8);

    let kernel = controller
        .cache()
        .lookup(StageLabel::Kernel)
        .and_then(|id| controller.blocks().get(id))
        .expect("kernel cached");
    let last = kernel.packets().last().expect("kernel has packets");
    assert_eq!(
        last.instructions().last().map(|insn| insn.mnemonic()),
        Some(CANONICAL_STORE_MNEMONIC)
    );
}

#[rstest]
#[case(1, 1)]
#[case(2, 2)]
#[case(8, 2)]
#[case(64, 2)]
fn single_loop_translation_count_is_flat(#[case] iterations: u32, #[case] blocks: usize) {
    let program = single_loop_program().expect("fixture");
    let mut controller = SingleLoopController::new(EngineConfig::default());
    let summary = controller
        .run(program.as_slice(), PipelineState::single(iterations), &mut NoopTraceSink)
        .expect("run");
    assert_eq!(summary.steps.len(), 1);
    assert_eq!(controller.blocks().len(), blocks);
    assert_eq!(summary.body_executions(), u64::from(iterations));
}

#[test]
fn nested_loop_reference_run() {
    let program = nested_loop_program().expect("fixture");
    assert_eq!(classify(program.as_slice()), StreamShape::NestedLoop);

    let mut controller = NestedLoopController::new(EngineConfig::default());
    let mut state = PipelineState::nested(
        NESTED_INNER_ITERATIONS,
        NESTED_RELOAD_ITERATIONS,
        NESTED_OUTER_ITERATIONS,
    );
    let mut stages = Vec::new();
    for _ in 0..NESTED_OUTER_ITERATIONS {
        state = controller
            .step(program.as_slice(), state, &mut NoopTraceSink)
            .expect("step")
            .state;
        stages.push(state.stage);
    }

    assert_eq!(stages, vec![Stage::Overlap, Stage::Overlap, Stage::Prolog]);
    assert_eq!(state, PipelineState::idle());
    assert_eq!(controller.blocks().len(), 3);
    let labels: Vec<_> = controller.blocks().iter().map(|block| block.label()).collect();
    assert_eq!(
        labels,
        vec![
            Some(StageLabel::Prolog),
            Some(StageLabel::Kernel),
            Some(StageLabel::Overlap),
        ]
    );
}

#[test]
fn nested_trace_narrates_stage_changes() {
    let program = nested_loop_program().expect("fixture");
    let mut controller = NestedLoopController::new(EngineConfig::default());
    let mut events: Vec<TraceEvent> = Vec::new();
    controller
        .run(program.as_slice(), PipelineState::nested(3, 3, 2), &mut events)
        .expect("run");

    let stages: Vec<(Stage, Stage)> = events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::StageChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            (Stage::Prolog, Stage::Kernel),
            (Stage::Kernel, Stage::Overlap),
            (Stage::Overlap, Stage::Kernel),
            (Stage::Kernel, Stage::Prolog),
        ]
    );
    assert!(matches!(
        events.last(),
        Some(TraceEvent::LoopCompleted {
            translated_blocks: 3
        })
    ));
}

type Execution = (Option<StageLabel>, u32, bool);

fn traced_step(
    controller: &mut NestedLoopController,
    state: PipelineState,
) -> (StepReport, Vec<(Stage, Stage)>) {
    let program = nested_loop_program().expect("fixture");
    let mut events: Vec<TraceEvent> = Vec::new();
    let report = controller
        .step(program.as_slice(), state, &mut events)
        .expect("step");
    let stages = events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::StageChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    (report, stages)
}

fn executions(report: &StepReport) -> Vec<Execution> {
    report
        .executions
        .iter()
        .map(|execution| (execution.label, execution.times, execution.translated))
        .collect()
}

#[rstest]
#[case::inner_exhausted_at_prolog(
    PipelineState::nested(0, 3, 2),
    vec![(Some(StageLabel::Prolog), 1, true)],
    vec![(Stage::Prolog, Stage::Overlap)],
    PipelineState { stage: Stage::Overlap, ..PipelineState::nested(3, 3, 1) }
)]
#[case::inner_exhausted_at_kernel(
    PipelineState { stage: Stage::Kernel, ..PipelineState::nested(0, 3, 2) },
    vec![],
    vec![(Stage::Kernel, Stage::Overlap)],
    PipelineState { stage: Stage::Overlap, ..PipelineState::nested(3, 3, 1) }
)]
#[case::no_outer_iterations_left(
    PipelineState::nested(4, 4, 0),
    vec![],
    vec![],
    PipelineState::nested(4, 4, 0)
)]
fn nested_entry_edge_cases(
    #[case] entry: PipelineState,
    #[case] expected_executions: Vec<Execution>,
    #[case] expected_stages: Vec<(Stage, Stage)>,
    #[case] expected_state: PipelineState,
) {
    let mut controller = NestedLoopController::new(EngineConfig::default());
    let (report, stages) = traced_step(&mut controller, entry);

    assert_eq!(executions(&report), expected_executions);
    assert_eq!(stages, expected_stages);
    assert_eq!(report.state, expected_state);
    assert_eq!(controller.cache().lookup(StageLabel::Kernel), None);
    assert_eq!(controller.blocks().len(), expected_executions.len());
}

#[rstest]
#[case::reload_to_one(
    1,
    vec![
        (Some(StageLabel::Overlap), 1, true),
        (Some(StageLabel::Prolog), 1, false),
    ],
    vec![(Stage::Overlap, Stage::Prolog)]
)]
#[case::reload_to_two(
    2,
    vec![
        (Some(StageLabel::Overlap), 1, true),
        (Some(StageLabel::Prolog), 1, false),
        (Some(StageLabel::Kernel), 1, false),
    ],
    vec![(Stage::Overlap, Stage::Kernel), (Stage::Kernel, Stage::Prolog)]
)]
fn nested_overlap_after_reload(
    #[case] reload: u32,
    #[case] expected_executions: Vec<Execution>,
    #[case] expected_stages: Vec<(Stage, Stage)>,
) {
    let mut controller = NestedLoopController::new(EngineConfig::default());
    let (first, first_stages) = traced_step(&mut controller, PipelineState::nested(3, reload, 2));
    assert_eq!(
        executions(&first),
        vec![
            (Some(StageLabel::Prolog), 1, true),
            (Some(StageLabel::Kernel), 2, true),
        ]
    );
    assert_eq!(
        first_stages,
        vec![(Stage::Prolog, Stage::Kernel), (Stage::Kernel, Stage::Overlap)]
    );
    assert_eq!(
        first.state,
        PipelineState {
            stage: Stage::Overlap,
            ..PipelineState::nested(reload, reload, 1)
        }
    );

    let (second, second_stages) = traced_step(&mut controller, first.state);
    assert_eq!(executions(&second), expected_executions);
    assert_eq!(second_stages, expected_stages);
    assert_eq!(second.state, PipelineState::idle());
    assert_eq!(second.translated_blocks(), 1);
    assert_eq!(second.body_executions(), u64::from(reload));
    assert_eq!(controller.blocks().len(), 3);
}

#[test]
fn silent_config_emits_nothing() {
    let program = nested_loop_program().expect("fixture");
    let mut controller = NestedLoopController::new(EngineConfig::default().silent());
    let mut events: Vec<TraceEvent> = Vec::new();
    controller
        .run(program.as_slice(), PipelineState::nested(3, 3, 2), &mut events)
        .expect("run");
    assert!(events.is_empty());
}

#[test]
fn independent_controllers_do_not_share_blocks() {
    let program = nested_loop_program().expect("fixture");
    let mut first = NestedLoopController::new(EngineConfig::default());
    let mut second = NestedLoopController::new(EngineConfig::default());
    first
        .run(program.as_slice(), PipelineState::nested(2, 2, 2), &mut NoopTraceSink)
        .expect("run");
    assert_eq!(first.blocks().len(), 3);
    assert!(second.blocks().is_empty());
    second
        .step(program.as_slice(), PipelineState::nested(2, 2, 1), &mut NoopTraceSink)
        .expect("step");
    assert_eq!(second.blocks().len(), 2);
}

proptest! {
    #[test]
    fn property_single_loop_reuse_bound(iterations in 1u32..200) {
        let program = single_loop_program().expect("fixture");
        let mut controller = SingleLoopController::new(EngineConfig::default());
        let report = controller
            .step(program.as_slice(), PipelineState::single(iterations), &mut NoopTraceSink)
            .expect("step");
        prop_assert!(controller.blocks().len() <= 2);
        prop_assert_eq!(report.body_executions(), u64::from(iterations));
        prop_assert_eq!(report.state, PipelineState::idle());
    }

    #[test]
    fn property_nested_loop_reuse_bound(outer in 1u32..8, inner in 1u32..40) {
        let program = nested_loop_program().expect("fixture");
        let mut controller = NestedLoopController::new(EngineConfig::default());
        let summary = controller
            .run(program.as_slice(), PipelineState::nested(inner, inner, outer), &mut NoopTraceSink)
            .expect("run");
        prop_assert!(controller.blocks().len() <= 3);
        prop_assert_eq!(summary.steps.len(), outer as usize);
        prop_assert_eq!(summary.body_executions(), u64::from(outer) * u64::from(inner));
        prop_assert_eq!(summary.final_state(), Some(PipelineState::idle()));
    }
}
