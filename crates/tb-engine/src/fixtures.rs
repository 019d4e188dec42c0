//! Reference guest programs used by tests, examples and the driver.
//!
//! Listing lines start at 1 and increase through each program.

use crate::{
    EngineError, ExecutePacket, Instruction, InstructionBuilder, InstructionKind, PacketStream,
    DEFAULT_BRANCH_DELAY_SLOTS,
};

/// Inner loop count the single-loop program is run with.
pub const SINGLE_LOOP_ITERATIONS: u32 = 8;
/// Inner loop count the nested-loop program is run with.
pub const NESTED_INNER_ITERATIONS: u32 = 7;
/// Inner loop reload count the nested-loop program is run with.
pub const NESTED_RELOAD_ITERATIONS: u32 = 7;
/// Outer iterations the nested-loop program is run with.
pub const NESTED_OUTER_ITERATIONS: u32 = 3;

fn insn(
    kind: InstructionKind,
    mnemonic: &str,
    unit: &str,
    operands: &str,
    line: u32,
) -> InstructionBuilder {
    Instruction::builder(kind, mnemonic)
        .unit(unit)
        .operands(operands)
        .line(line)
}

fn branch(unit: &str, target: &str, line: u32) -> InstructionBuilder {
    insn(InstructionKind::Branch, "B", unit, target, line)
        .delay_slots(i64::from(DEFAULT_BRANCH_DELAY_SLOTS))
}

fn nop(cycles: u32, line: u32) -> InstructionBuilder {
    let operands = if cycles > 1 { cycles.to_string() } else { String::new() };
    insn(InstructionKind::NoOp, "NOP", "", &operands, line)
}

/// Thirteen packets of branches, nops and arithmetic with no loop markers.
///
/// # Errors
///
/// Never fails for the built-in listing; construction errors propagate.
pub fn straight_line_program() -> Result<PacketStream, EngineError> {
    let mut stream = PacketStream::new();
    for line in 1..=5 {
        stream.push(1, vec![branch(".S2", "LOOP", line).build()?])?;
    }
    stream.push(
        1,
        vec![
            insn(InstructionKind::Arithmetic, "SUB", ".D2", "B1, 0x1, B1", 6)
                .predicate("[B1]")
                .build()?,
            branch(".S1", "LOOP", 7).predicate("[B1]").parallel(true).build()?,
        ],
    )?;
    stream.push(1, vec![branch(".S2", "B3", 8).build()?])?;
    for line in 9..=12 {
        stream.push(1, vec![nop(1, line).build()?])?;
    }
    stream.push(
        1,
        vec![insn(InstructionKind::Arithmetic, "MV", ".L1", "A10, A2", 13).build()?],
    )?;
    stream.push(
        1,
        vec![insn(InstructionKind::Arithmetic, "ADD", ".L1", "A4, A2, A4", 14).build()?],
    )?;
    Ok(stream)
}

/// A store issued in parallel with a load from the same packet.
///
/// # Errors
///
/// Never fails for the built-in listing; construction errors propagate.
pub fn load_store_packet() -> Result<ExecutePacket, EngineError> {
    ExecutePacket::new(
        1,
        1,
        vec![
            insn(InstructionKind::Store, "STW", ".D2", "B2, *B0++", 1).build()?,
            insn(InstructionKind::Load, "LDW", ".D1", "*A1++, A2", 2)
                .parallel(true)
                .build()?,
        ],
    )
}

/// Single software-pipelined copy loop; the body starts at index 4.
///
/// # Errors
///
/// Never fails for the built-in listing; construction errors propagate.
pub fn single_loop_program() -> Result<PacketStream, EngineError> {
    let mut stream = PacketStream::new();
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "MVK", ".S", "8, A0", 1).build()?])?;
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "MVC", ".S", "A0, ILC", 2).build()?])?;
    stream.push(3, vec![nop(3, 3).build()?])?;
    stream.push(1, vec![insn(InstructionKind::LoopStart, "SPLOOP", "", "1", 4).build()?])?;
    stream.push(1, vec![insn(InstructionKind::Load, "LDW", ".D", "*A1++, A2", 5).build()?])?;
    stream.push(4, vec![nop(4, 6).build()?])?;
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "MV", ".L1X", "A2, B2", 7).build()?])?;
    stream.push(
        1,
        vec![
            insn(InstructionKind::LoopKernel, "SPKERNEL", "", "6, 0", 8).build()?,
            insn(InstructionKind::Store, "STW", ".D", "B2, *B0++", 9)
                .parallel(true)
                .build()?,
        ],
    )?;
    Ok(stream)
}

/// Software-pipelined inner loop inside an outer loop; the body starts at
/// index 6 and the branch back to the outer loop sits at index 10.
///
/// # Errors
///
/// Never fails for the built-in listing; construction errors propagate.
pub fn nested_loop_program() -> Result<PacketStream, EngineError> {
    let mut stream = PacketStream::new();
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "MVK", ".S", "7, A8", 1).build()?])?;
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "MVC", ".S", "A8, ILC", 2).build()?])?;
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "MVC", ".S", "A8, RILC", 3).build()?])?;
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "MVK", ".S", "1, A1", 4).build()?])?;
    stream.push(3, vec![nop(3, 5).build()?])?;
    stream.push(
        1,
        vec![insn(InstructionKind::LoopStart, "SPLOOP", "", "1", 6)
            .predicate("[A1]")
            .build()?],
    )?;
    stream.push(1, vec![insn(InstructionKind::Load, "LDW", ".D1", "*A4++, A0", 7).build()?])?;
    stream.push(4, vec![nop(4, 8).build()?])?;
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "MV", ".L2X", "A0, B0", 9).build()?])?;
    stream.push(
        1,
        vec![
            insn(InstructionKind::LoopKernel, "SPKERNELR", "", "", 10).build()?,
            insn(InstructionKind::Store, "STW", ".D2", "B0, *B4++", 11)
                .parallel(true)
                .build()?,
        ],
    )?;
    stream.push(
        1,
        vec![insn(InstructionKind::Branch, "BR", ".S2", "TARGET", 12)
            .delay_slots(i64::from(DEFAULT_BRANCH_DELAY_SLOTS))
            .build()?],
    )?;
    stream.push(
        1,
        vec![
            insn(InstructionKind::LoopMask, "SPMASK", ".D", "", 13).build()?,
            insn(InstructionKind::Branch, "B", "", "BR TARGET", 14)
                .predicate("[A1]")
                .delay_slots(0)
                .parallel(true)
                .build()?,
            insn(InstructionKind::Arithmetic, "SUB", ".S1", "A1, 1, A1", 15)
                .predicate("[A1]")
                .parallel(true)
                .build()?,
            insn(InstructionKind::Load, "LDW", ".D1", "*A6, A0", 16)
                .predicate("[A1]")
                .parallel(true)
                .build()?,
            insn(InstructionKind::Arithmetic, "ADD", ".L1", "A6, 4, A4", 17)
                .predicate("[A1]")
                .parallel(true)
                .build()?,
        ],
    )?;
    stream.push(4, vec![nop(4, 18).build()?])?;
    stream.push(1, vec![insn(InstructionKind::Arithmetic, "OR", ".S2", "B6, 0, B4", 19).build()?])?;
    stream.push(1, vec![nop(1, 20).build()?])?;
    Ok(stream)
}
