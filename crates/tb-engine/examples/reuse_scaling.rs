//! Translation count and wall time of the loop controllers versus iteration count.
//!
//! ## Usage
//!
//! ```sh
//! cargo run -p tb-engine --example reuse_scaling
//! ```
//!
//! Each row runs the reference single loop with `N` iterations and the
//! reference nested loop with `N` inner and `N / 8 + 1` outer iterations.
//! The translated-block columns stay flat while logical executions grow.

#![allow(clippy::pedantic)]

use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tb_engine::fixtures::{nested_loop_program, single_loop_program};
use tb_engine::{
    EngineConfig, LoopController, NestedLoopController, NoopTraceSink, PipelineState,
    SingleLoopController,
};
use thiserror as _;

use std::time::{Duration, Instant};

const ITERATION_COUNTS: [u32; 6] = [1, 8, 64, 512, 4_096, 32_768];
const REPETITIONS: u32 = 200;

#[derive(Debug, Clone, Copy)]
struct Row {
    iterations: u32,
    single_blocks: usize,
    single_executions: u64,
    nested_blocks: usize,
    nested_executions: u64,
    elapsed: Duration,
}

fn measure(iterations: u32) -> Row {
    let single_program = single_loop_program().expect("single-loop fixture builds");
    let nested_program = nested_loop_program().expect("nested-loop fixture builds");
    let config = EngineConfig::default().silent();
    let outer = iterations / 8 + 1;

    let mut row = Row {
        iterations,
        single_blocks: 0,
        single_executions: 0,
        nested_blocks: 0,
        nested_executions: 0,
        elapsed: Duration::ZERO,
    };

    let start = Instant::now();
    for _ in 0..REPETITIONS {
        let mut single = SingleLoopController::new(config);
        let summary = single
            .run(
                single_program.as_slice(),
                PipelineState::single(iterations),
                &mut NoopTraceSink,
            )
            .expect("single loop runs");
        row.single_blocks = single.blocks().len();
        row.single_executions = summary.body_executions();

        let mut nested = NestedLoopController::new(config);
        let summary = nested
            .run(
                nested_program.as_slice(),
                PipelineState::nested(iterations, iterations, outer),
                &mut NoopTraceSink,
            )
            .expect("nested loop runs");
        row.nested_blocks = nested.blocks().len();
        row.nested_executions = summary.body_executions();
    }
    row.elapsed = start.elapsed() / REPETITIONS;
    row
}

fn main() {
    println!(
        "{:>10} {:>14} {:>12} {:>14} {:>12} {:>12}",
        "N", "single blocks", "single execs", "nested blocks", "nested execs", "time/run"
    );
    for iterations in ITERATION_COUNTS {
        let row = measure(iterations);
        println!(
            "{:>10} {:>14} {:>12} {:>14} {:>12} {:>12?}",
            row.iterations,
            row.single_blocks,
            row.single_executions,
            row.nested_blocks,
            row.nested_executions,
            row.elapsed
        );
    }
}
