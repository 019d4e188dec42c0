//! Mnemonic classification into engine instruction kinds.

use tb_engine::InstructionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MnemonicEntry {
    name: &'static str,
    kind: InstructionKind,
}

const fn entry(name: &'static str, kind: InstructionKind) -> MnemonicEntry {
    MnemonicEntry { name, kind }
}

const MNEMONIC_ENTRIES: &[MnemonicEntry] = &[
    entry("B", InstructionKind::Branch),
    entry("BR", InstructionKind::Branch),
    entry("BNOP", InstructionKind::Branch),
    entry("BDEC", InstructionKind::Branch),
    entry("BPOS", InstructionKind::Branch),
    entry("CALLP", InstructionKind::Branch),
    entry("STB", InstructionKind::Store),
    entry("STH", InstructionKind::Store),
    entry("STW", InstructionKind::Store),
    entry("STDW", InstructionKind::Store),
    entry("STNW", InstructionKind::Store),
    entry("STNDW", InstructionKind::Store),
    entry("LDB", InstructionKind::Load),
    entry("LDBU", InstructionKind::Load),
    entry("LDH", InstructionKind::Load),
    entry("LDHU", InstructionKind::Load),
    entry("LDW", InstructionKind::Load),
    entry("LDDW", InstructionKind::Load),
    entry("LDNW", InstructionKind::Load),
    entry("LDNDW", InstructionKind::Load),
    entry("ADD", InstructionKind::Arithmetic),
    entry("ADDK", InstructionKind::Arithmetic),
    entry("SUB", InstructionKind::Arithmetic),
    entry("MPY", InstructionKind::Arithmetic),
    entry("AND", InstructionKind::Arithmetic),
    entry("OR", InstructionKind::Arithmetic),
    entry("XOR", InstructionKind::Arithmetic),
    entry("SHL", InstructionKind::Arithmetic),
    entry("SHR", InstructionKind::Arithmetic),
    entry("CMPEQ", InstructionKind::Arithmetic),
    entry("CMPGT", InstructionKind::Arithmetic),
    entry("CMPLT", InstructionKind::Arithmetic),
    entry("MV", InstructionKind::Arithmetic),
    entry("MVK", InstructionKind::Arithmetic),
    entry("MVKL", InstructionKind::Arithmetic),
    entry("MVKH", InstructionKind::Arithmetic),
    entry("MVC", InstructionKind::Arithmetic),
    entry("NOP", InstructionKind::NoOp),
    entry("SPLOOP", InstructionKind::LoopStart),
    entry("SPLOOPD", InstructionKind::LoopStart),
    entry("SPLOOPW", InstructionKind::LoopStart),
    entry("SPKERNEL", InstructionKind::LoopKernel),
    entry("SPKERNELR", InstructionKind::LoopKernel),
    entry("SPMASK", InstructionKind::LoopMask),
    entry("SPMASKR", InstructionKind::LoopMask),
];

/// Classifies a mnemonic; unknown mnemonics are [`InstructionKind::Other`].
///
/// Matching is ASCII case-insensitive.
#[must_use]
pub fn classify_mnemonic(name: &str) -> InstructionKind {
    MNEMONIC_ENTRIES
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
        .map_or(InstructionKind::Other, |entry| entry.kind)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tb_engine::InstructionKind;

    use super::{classify_mnemonic, MNEMONIC_ENTRIES};

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(classify_mnemonic("spkernelr"), InstructionKind::LoopKernel);
        assert_eq!(classify_mnemonic("Ldw"), InstructionKind::Load);
    }

    #[test]
    fn unknown_mnemonic_is_other() {
        assert_eq!(classify_mnemonic("DOTP2"), InstructionKind::Other);
    }

    #[test]
    fn table_names_are_unique() {
        let names: HashSet<&str> = MNEMONIC_ENTRIES.iter().map(|entry| entry.name).collect();
        assert_eq!(names.len(), MNEMONIC_ENTRIES.len());
    }

    #[test]
    fn every_kind_but_other_has_a_mnemonic() {
        for kind in InstructionKind::ALL {
            let covered = MNEMONIC_ENTRIES.iter().any(|entry| entry.kind == kind);
            assert_eq!(covered, kind != InstructionKind::Other, "{kind}");
        }
    }
}
