//! Store-deferral translation of a single execute packet.

use crate::{ExecutePacket, Instruction, TraceEvent, TraceSink};

/// Mnemonic every deferred store is re-emitted with.
pub const CANONICAL_STORE_MNEMONIC: &str = "STW";

/// Emits the packet's non-store instructions first, then every store as a
/// canonical store, each partition in its original relative order.
///
/// Loads issued in the same packet as a store therefore observe memory as it
/// was before the packet. Sequence and cycle cost are unchanged.
pub fn translate_packet(packet: &ExecutePacket, sink: &mut dyn TraceSink) -> ExecutePacket {
    let (stores, others): (Vec<&Instruction>, Vec<&Instruction>) =
        packet.instructions().iter().partition(|insn| insn.is_store());

    let mut ordered: Vec<Instruction> = others.into_iter().cloned().collect();
    for store in stores {
        sink.on_event(TraceEvent::StoreDeferred {
            sequence: packet.sequence(),
            source_line: store.source_line(),
        });
        ordered.push(store.with_mnemonic(CANONICAL_STORE_MNEMONIC));
    }
    packet.with_instructions(ordered)
}

#[cfg(test)]
mod tests {
    use super::{translate_packet, CANONICAL_STORE_MNEMONIC};
    use crate::{
        ExecutePacket, Instruction, InstructionKind, NoopTraceSink, TraceEvent,
    };

    fn insn(kind: InstructionKind, mnemonic: &str, line: u32) -> Instruction {
        Instruction::builder(kind, mnemonic)
            .unit(".D1")
            .operands(format!("op{line}"))
            .line(line)
            .build()
            .expect("instruction builds")
    }

    #[test]
    fn store_moves_behind_load() {
        let packet = ExecutePacket::new(
            1,
            1,
            vec![
                insn(InstructionKind::Store, "STH", 1),
                insn(InstructionKind::Load, "LDW", 2),
            ],
        )
        .expect("packet");
        let mut events: Vec<TraceEvent> = Vec::new();
        let translated = translate_packet(&packet, &mut events);

        let order: Vec<(&str, u32)> = translated
            .instructions()
            .iter()
            .map(|insn| (insn.mnemonic(), insn.source_line()))
            .collect();
        assert_eq!(order, vec![("LDW", 2), (CANONICAL_STORE_MNEMONIC, 1)]);
        assert_eq!(translated.instructions()[1].operands(), "op1");
        assert_eq!(translated.instructions()[1].functional_unit(), ".D1");
        assert_eq!(
            events,
            vec![TraceEvent::StoreDeferred {
                sequence: 1,
                source_line: 1,
            }]
        );
    }

    #[test]
    fn relative_order_is_kept_in_each_partition() {
        let packet = ExecutePacket::new(
            3,
            2,
            vec![
                insn(InstructionKind::Store, "STW", 1),
                insn(InstructionKind::Arithmetic, "ADD", 2),
                insn(InstructionKind::Store, "STB", 3),
                insn(InstructionKind::Load, "LDW", 4),
            ],
        )
        .expect("packet");
        let translated = translate_packet(&packet, &mut NoopTraceSink);
        let lines: Vec<u32> = translated
            .instructions()
            .iter()
            .map(Instruction::source_line)
            .collect();
        assert_eq!(lines, vec![2, 4, 1, 3]);
        assert_eq!(translated.sequence(), 3);
        assert_eq!(translated.cycle_cost(), 2);
    }

    #[test]
    fn packet_without_stores_is_unchanged() {
        let packet = ExecutePacket::new(
            1,
            1,
            vec![
                insn(InstructionKind::Load, "LDW", 1),
                insn(InstructionKind::Arithmetic, "ADD", 2),
            ],
        )
        .expect("packet");
        assert_eq!(translate_packet(&packet, &mut NoopTraceSink), packet);
    }
}
