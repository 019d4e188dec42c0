#![no_main]

use libfuzzer_sys::fuzz_target;
use tb_engine::{
    classify, form_block, translate_straight_line, BlockId, CycleBudget, EngineConfig,
    Instruction, InstructionKind, LoopController, NestedLoopController, NoopTraceSink,
    PacketStream, PipelineState, SingleLoopController, StreamShape,
};

fn decode_stream(data: &[u8]) -> Option<PacketStream> {
    let mut stream = PacketStream::new();
    for (line, chunk) in data.chunks_exact(3).enumerate() {
        let line = u32::try_from(line).ok()?;
        let kind = InstructionKind::ALL[usize::from(chunk[0] & 0x0F) % InstructionKind::ALL.len()];
        let mut instructions = vec![Instruction::builder(kind, "OP")
            .delay_slots(i64::from(chunk[2] % 10))
            .line(line)
            .build()
            .ok()?];
        if chunk[0] & 0x80 != 0 {
            instructions.push(
                Instruction::builder(InstructionKind::Store, "STH")
                    .parallel(true)
                    .line(line)
                    .build()
                    .ok()?,
            );
        }
        stream.push(u32::from(chunk[1] % 4) + 1, instructions).ok()?;
    }
    Some(stream)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let Some(stream) = decode_stream(&data[1..]) else {
        return;
    };
    let packets = stream.as_slice();
    let config = EngineConfig::default().silent();

    let start = usize::from(data[0] & 0x1F);
    let budget = u32::from(data[0] >> 5) + 1;
    let formed = form_block(
        packets,
        start,
        CycleBudget::Cycles(budget),
        BlockId::new(0),
        &config,
        &mut NoopTraceSink,
    );
    if packets.get(start).is_some_and(|packet| packet.cycle_cost() <= budget) {
        assert!(formed.block.total_cycles() <= u64::from(budget));
    }

    let run = translate_straight_line(packets, &config, &mut NoopTraceSink);
    let covered: usize = run.blocks.iter().map(|block| block.len()).sum();
    assert_eq!(covered, packets.len());

    let counter = u32::from(data[0] % 6);
    match classify(packets) {
        StreamShape::StraightLine => {}
        StreamShape::SingleLoop => {
            let mut controller = SingleLoopController::new(config);
            let _ = controller.run(packets, PipelineState::single(counter), &mut NoopTraceSink);
            assert!(controller.blocks().len() <= 2);
        }
        StreamShape::NestedLoop => {
            let mut controller = NestedLoopController::new(config);
            let _ = controller.run(
                packets,
                PipelineState::nested(counter, counter, counter),
                &mut NoopTraceSink,
            );
            assert!(controller.blocks().len() <= 3);
        }
    }
});
