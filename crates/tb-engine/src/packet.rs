//! Guest instruction and execute-packet data model.
//!
//! Instructions and packets are validated on construction: a branch always
//! carries a non-negative delay-slot count, and a packet is never empty and
//! never costs zero cycles. Downstream stages rely on these invariants and do
//! not re-check them.

use std::fmt;

use crate::EngineError;

/// Delay-slot count assumed for a branch whose listing does not state one.
pub const DEFAULT_BRANCH_DELAY_SLOTS: u32 = 5;

/// Operation class of a guest instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InstructionKind {
    /// Control transfer with explicit delay slots.
    Branch,
    /// Memory write.
    Store,
    /// Memory read.
    Load,
    /// Register-to-register computation.
    Arithmetic,
    /// Idle cycles.
    NoOp,
    /// Software-pipelined loop start marker.
    LoopStart,
    /// Software-pipelined loop kernel marker.
    LoopKernel,
    /// Predicate-mask marker.
    LoopMask,
    /// Anything the engine does not treat specially.
    Other,
}

impl InstructionKind {
    /// All kinds in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Branch,
        Self::Store,
        Self::Load,
        Self::Arithmetic,
        Self::NoOp,
        Self::LoopStart,
        Self::LoopKernel,
        Self::LoopMask,
        Self::Other,
    ];

    /// Returns `true` for the three software-pipelining markers.
    #[must_use]
    pub const fn is_loop_marker(self) -> bool {
        matches!(self, Self::LoopStart | Self::LoopKernel | Self::LoopMask)
    }

    /// Stable lowercase name used in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Store => "store",
            Self::Load => "load",
            Self::Arithmetic => "arithmetic",
            Self::NoOp => "nop",
            Self::LoopStart => "loop-start",
            Self::LoopKernel => "loop-kernel",
            Self::LoopMask => "loop-mask",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One guest operation inside an execute packet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Instruction {
    kind: InstructionKind,
    mnemonic: String,
    functional_unit: String,
    delay_slots: u32,
    predicate: Option<String>,
    operands: String,
    source_line: u32,
    issued_in_parallel: bool,
}

impl Instruction {
    /// Starts building an instruction of `kind`.
    #[must_use]
    pub fn builder(kind: InstructionKind, mnemonic: impl Into<String>) -> InstructionBuilder {
        InstructionBuilder {
            kind,
            mnemonic: mnemonic.into(),
            functional_unit: String::new(),
            delay_slots: None,
            predicate: None,
            operands: String::new(),
            source_line: 0,
            issued_in_parallel: false,
        }
    }

    /// Operation class.
    #[must_use]
    pub const fn kind(&self) -> InstructionKind {
        self.kind
    }

    /// Opaque mnemonic text.
    #[must_use]
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Opaque functional-unit text (empty when the listing names none).
    #[must_use]
    pub fn functional_unit(&self) -> &str {
        &self.functional_unit
    }

    /// Branch delay slots; always 0 for non-branches.
    #[must_use]
    pub const fn delay_slots(&self) -> u32 {
        self.delay_slots
    }

    /// Guard-register condition, if any.
    #[must_use]
    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    /// Opaque operand text.
    #[must_use]
    pub fn operands(&self) -> &str {
        &self.operands
    }

    /// Listing line the instruction came from.
    #[must_use]
    pub const fn source_line(&self) -> u32 {
        self.source_line
    }

    /// Whether the instruction was issued in parallel with its predecessor.
    #[must_use]
    pub const fn issued_in_parallel(&self) -> bool {
        self.issued_in_parallel
    }

    /// Shorthand for `kind() == Branch`.
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        matches!(self.kind, InstructionKind::Branch)
    }

    /// Shorthand for `kind() == Store`.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self.kind, InstructionKind::Store)
    }

    /// Copy of this store with the mnemonic replaced by `mnemonic`.
    pub(crate) fn with_mnemonic(&self, mnemonic: &str) -> Self {
        Self {
            mnemonic: mnemonic.to_owned(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issued_in_parallel {
            f.write_str("|| ")?;
        }
        if let Some(predicate) = &self.predicate {
            write!(f, "{predicate} ")?;
        }
        f.write_str(&self.mnemonic)?;
        if !self.functional_unit.is_empty() {
            write!(f, " {}", self.functional_unit)?;
        }
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        Ok(())
    }
}

/// Validating builder for [`Instruction`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct InstructionBuilder {
    kind: InstructionKind,
    mnemonic: String,
    functional_unit: String,
    delay_slots: Option<i64>,
    predicate: Option<String>,
    operands: String,
    source_line: u32,
    issued_in_parallel: bool,
}

impl InstructionBuilder {
    /// Sets the functional unit (for example `.S2`).
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.functional_unit = unit.into();
        self
    }

    /// Sets the branch delay-slot count. Ignored for non-branches.
    pub const fn delay_slots(mut self, delay: i64) -> Self {
        self.delay_slots = Some(delay);
        self
    }

    /// Sets the guard predicate (for example `[B1]`).
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Sets the operand text.
    pub fn operands(mut self, operands: impl Into<String>) -> Self {
        self.operands = operands.into();
        self
    }

    /// Sets the source line.
    pub const fn line(mut self, line: u32) -> Self {
        self.source_line = line;
        self
    }

    /// Marks the instruction as issued in parallel with its predecessor.
    pub const fn parallel(mut self, parallel: bool) -> Self {
        self.issued_in_parallel = parallel;
        self
    }

    /// Validates and returns the instruction.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NegativeOrMissingDelay`] for a branch without a
    /// delay-slot count that fits in `u32`.
    pub fn build(self) -> Result<Instruction, EngineError> {
        let delay_slots = match (self.kind, self.delay_slots) {
            (InstructionKind::Branch, Some(delay)) => {
                u32::try_from(delay).map_err(|_| EngineError::NegativeOrMissingDelay {
                    mnemonic: self.mnemonic.clone(),
                    line: self.source_line,
                    delay: Some(delay),
                })?
            }
            (InstructionKind::Branch, None) => {
                return Err(EngineError::NegativeOrMissingDelay {
                    mnemonic: self.mnemonic,
                    line: self.source_line,
                    delay: None,
                })
            }
            _ => 0,
        };
        Ok(Instruction {
            kind: self.kind,
            mnemonic: self.mnemonic,
            functional_unit: self.functional_unit,
            delay_slots,
            predicate: self.predicate,
            operands: self.operands,
            source_line: self.source_line,
            issued_in_parallel: self.issued_in_parallel,
        })
    }
}

/// Ordered, non-empty group of instructions issued together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExecutePacket {
    sequence: u32,
    cycle_cost: u32,
    instructions: Vec<Instruction>,
}

impl ExecutePacket {
    /// Creates a packet.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyPacket`] when `instructions` is empty and
    /// [`EngineError::ZeroCycleCost`] when `cycle_cost` is 0.
    pub fn new(
        sequence: u32,
        cycle_cost: u32,
        instructions: Vec<Instruction>,
    ) -> Result<Self, EngineError> {
        if instructions.is_empty() {
            return Err(EngineError::EmptyPacket { sequence });
        }
        if cycle_cost == 0 {
            return Err(EngineError::ZeroCycleCost { sequence });
        }
        Ok(Self {
            sequence,
            cycle_cost,
            instructions,
        })
    }

    /// Same packet identity with a different instruction order.
    pub(crate) const fn with_instructions(&self, instructions: Vec<Instruction>) -> Self {
        Self {
            sequence: self.sequence,
            cycle_cost: self.cycle_cost,
            instructions,
        }
    }

    /// Creation-order identifier.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Cycles the packet occupies.
    #[must_use]
    pub const fn cycle_cost(&self) -> u32 {
        self.cycle_cost
    }

    /// Instructions in issue order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns `true` when any instruction has `kind`.
    #[must_use]
    pub fn contains(&self, kind: InstructionKind) -> bool {
        self.instructions.iter().any(|insn| insn.kind() == kind)
    }

    /// Branch instructions in issue order.
    pub fn branches(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().filter(|insn| insn.is_branch())
    }

    /// Smallest delay-slot count over the packet's branches.
    #[must_use]
    pub fn min_branch_delay(&self) -> Option<u32> {
        self.branches().map(Instruction::delay_slots).min()
    }
}

impl fmt::Display for ExecutePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EP{}:", self.sequence)?;
        for insn in &self.instructions {
            write!(f, " {insn}")?;
        }
        Ok(())
    }
}

/// Ordered packet stream with strictly increasing sequence numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PacketStream {
    packets: Vec<ExecutePacket>,
}

impl PacketStream {
    /// Empty stream.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            packets: Vec::new(),
        }
    }

    /// Wraps externally numbered packets.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NonMonotonicSequence`] when a sequence number
    /// does not exceed its predecessor.
    pub fn from_packets(packets: Vec<ExecutePacket>) -> Result<Self, EngineError> {
        for pair in packets.windows(2) {
            if pair[1].sequence() <= pair[0].sequence() {
                return Err(EngineError::NonMonotonicSequence {
                    previous: pair[0].sequence(),
                    found: pair[1].sequence(),
                });
            }
        }
        Ok(Self { packets })
    }

    /// Appends a packet numbered after the current last packet (first is 1).
    ///
    /// # Errors
    ///
    /// Propagates [`ExecutePacket::new`] validation failures.
    pub fn push(
        &mut self,
        cycle_cost: u32,
        instructions: Vec<Instruction>,
    ) -> Result<&ExecutePacket, EngineError> {
        let sequence = self
            .packets
            .last()
            .map_or(1, |last| last.sequence().saturating_add(1));
        let packet = ExecutePacket::new(sequence, cycle_cost, instructions)?;
        self.packets.push(packet);
        Ok(&self.packets[self.packets.len() - 1])
    }

    /// Packets as a slice, the form every engine operation consumes.
    #[must_use]
    pub fn as_slice(&self) -> &[ExecutePacket] {
        &self.packets
    }

    /// Number of packets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Returns `true` when the stream holds no packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Consumes the stream.
    #[must_use]
    pub fn into_packets(self) -> Vec<ExecutePacket> {
        self.packets
    }
}

impl AsRef<[ExecutePacket]> for PacketStream {
    fn as_ref(&self) -> &[ExecutePacket] {
        &self.packets
    }
}
