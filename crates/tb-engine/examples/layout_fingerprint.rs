//! Deterministic fingerprint of the reference scenarios' block layouts.
//!
//! Hashes every block's id, label, packet sequences and instruction order so
//! two hosts can compare layouts with a single line of output.

use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tb_engine::fixtures::{
    load_store_packet, nested_loop_program, single_loop_program, straight_line_program,
    NESTED_INNER_ITERATIONS, NESTED_OUTER_ITERATIONS, NESTED_RELOAD_ITERATIONS,
    SINGLE_LOOP_ITERATIONS,
};
use tb_engine::{
    translate_packet, translate_straight_line, BlockLog, EngineConfig, ExecutePacket,
    LoopController, NestedLoopController, NoopTraceSink, PipelineState, SingleLoopController,
};
use thiserror as _;

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn hash_packet(hash: &mut u64, packet: &ExecutePacket) {
    hash_bytes(hash, &packet.sequence().to_le_bytes());
    hash_bytes(hash, &packet.cycle_cost().to_le_bytes());
    for insn in packet.instructions() {
        hash_bytes(hash, insn.to_string().as_bytes());
        hash_bytes(hash, &insn.source_line().to_le_bytes());
    }
}

fn hash_log(hash: &mut u64, log: &BlockLog) {
    for block in log {
        hash_bytes(hash, &block.id().raw().to_le_bytes());
        let label = block
            .label()
            .map_or(0xFF, |label| u8::try_from(label.index()).unwrap_or(0xFE));
        hash_bytes(hash, &[label]);
        for packet in block.packets() {
            hash_packet(hash, packet);
        }
    }
}

fn fingerprint() -> String {
    let config = EngineConfig::default().silent();
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;

    let straight = straight_line_program().expect("straight-line fixture builds");
    let run = translate_straight_line(straight.as_slice(), &config, &mut NoopTraceSink);
    hash_log(&mut hash, &run.blocks);

    let packet = load_store_packet().expect("load/store fixture builds");
    hash_packet(&mut hash, &translate_packet(&packet, &mut NoopTraceSink));

    let single = single_loop_program().expect("single-loop fixture builds");
    let mut controller = SingleLoopController::new(config);
    let summary = controller
        .run(
            single.as_slice(),
            PipelineState::single(SINGLE_LOOP_ITERATIONS),
            &mut NoopTraceSink,
        )
        .expect("single loop runs");
    hash_log(&mut hash, controller.blocks());
    hash_bytes(&mut hash, &summary.body_executions().to_le_bytes());

    let nested = nested_loop_program().expect("nested-loop fixture builds");
    let mut controller = NestedLoopController::new(config);
    let summary = controller
        .run(
            nested.as_slice(),
            PipelineState::nested(
                NESTED_INNER_ITERATIONS,
                NESTED_RELOAD_ITERATIONS,
                NESTED_OUTER_ITERATIONS,
            ),
            &mut NoopTraceSink,
        )
        .expect("nested loop runs");
    hash_log(&mut hash, controller.blocks());
    hash_bytes(&mut hash, &summary.body_executions().to_le_bytes());

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
