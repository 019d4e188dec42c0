use thiserror::Error;

/// Broad error classes used by callers to pick a recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Malformed instruction or packet input; the whole stream is unusable.
    Construction,
    /// Well-formed packets whose loop structure cannot be resolved.
    Structure,
}

/// Failures surfaced by packet construction and loop layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum EngineError {
    /// Packet created without instructions.
    #[error("execute packet {sequence} has no instructions")]
    EmptyPacket {
        /// Sequence number the packet would have had.
        sequence: u32,
    },
    /// Packet created with a zero cycle cost.
    #[error("execute packet {sequence} declares a zero cycle cost")]
    ZeroCycleCost {
        /// Sequence number the packet would have had.
        sequence: u32,
    },
    /// Externally numbered packets were not strictly increasing.
    #[error("execute packet sequence {found} does not follow {previous}")]
    NonMonotonicSequence {
        /// Sequence number of the earlier packet.
        previous: u32,
        /// Offending sequence number.
        found: u32,
    },
    /// Branch built without a usable delay-slot count.
    #[error("branch `{mnemonic}` at line {line} needs a non-negative delay-slot count (got {delay:?})")]
    NegativeOrMissingDelay {
        /// Branch mnemonic.
        mnemonic: String,
        /// Listing line of the branch.
        line: u32,
        /// Rejected value, `None` when absent.
        delay: Option<i64>,
    },
    /// Loop controller ran on a stream without a loop-start marker.
    #[error("packet stream has no loop-start marker")]
    MissingLoopStart,
    /// Kernel scan ran off the end of the stream without finding a branch.
    #[error("kernel scan from packet index {start_index} reached the end of the stream without a branch")]
    UnresolvedLoopMarker {
        /// Index the scan started at.
        start_index: usize,
    },
}

impl EngineError {
    /// Returns the error class for this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::EmptyPacket { .. }
            | Self::ZeroCycleCost { .. }
            | Self::NonMonotonicSequence { .. }
            | Self::NegativeOrMissingDelay { .. } => ErrorClass::Construction,
            Self::MissingLoopStart | Self::UnresolvedLoopMarker { .. } => ErrorClass::Structure,
        }
    }

    /// Structural errors only disqualify the loop path; straight-line
    /// formation over the same stream is still valid.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self.class(), ErrorClass::Structure)
    }
}
