//! Structural location of software-pipelining markers in a packet stream.

use crate::{EngineError, ExecutePacket, Instruction, InstructionKind};

/// Control-flow shape of a packet stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StreamShape {
    /// No loop-start marker.
    StraightLine,
    /// Loop-start marker without a predicate-mask packet.
    SingleLoop,
    /// Loop-start marker plus a predicate-mask packet.
    NestedLoop,
}

/// Classifies `packets` by the markers they contain.
#[must_use]
pub fn classify(packets: &[ExecutePacket]) -> StreamShape {
    let has = |kind| packets.iter().any(|packet| packet.contains(kind));
    if !has(InstructionKind::LoopStart) {
        StreamShape::StraightLine
    } else if has(InstructionKind::LoopMask) {
        StreamShape::NestedLoop
    } else {
        StreamShape::SingleLoop
    }
}

fn is_mask_only(packet: &ExecutePacket) -> bool {
    packet
        .instructions()
        .iter()
        .all(|insn| insn.kind() == InstructionKind::LoopMask)
}

/// Marker positions of a loop body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LoopLayout {
    body_start: usize,
    kernel_indices: Vec<usize>,
    branch_back: Option<usize>,
    stream_len: usize,
}

impl LoopLayout {
    /// Locates the loop body, the kernel packets and the branch-back packet.
    ///
    /// The body starts after the first loop-start marker. The kernel scan
    /// walks from there, skipping mask-only packets, and stops at the first
    /// packet holding a branch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingLoopStart`] when no packet holds a
    /// loop-start marker.
    pub fn locate(packets: &[ExecutePacket]) -> Result<Self, EngineError> {
        let marker = packets
            .iter()
            .position(|packet| packet.contains(InstructionKind::LoopStart))
            .ok_or(EngineError::MissingLoopStart)?;
        let body_start = marker + 1;

        let mut kernel_indices = Vec::new();
        let mut branch_back = None;
        for (index, packet) in packets.iter().enumerate().skip(body_start) {
            if packet.instructions().iter().any(Instruction::is_branch) {
                branch_back = Some(index);
                break;
            }
            if !is_mask_only(packet) {
                kernel_indices.push(index);
            }
        }

        Ok(Self {
            body_start,
            kernel_indices,
            branch_back,
            stream_len: packets.len(),
        })
    }

    /// Index of the first packet after the loop-start marker.
    #[must_use]
    pub const fn body_start(&self) -> usize {
        self.body_start
    }

    /// Packets before the body start, loop-start marker included.
    #[must_use]
    pub fn prolog_indices(&self) -> Vec<usize> {
        (0..self.body_start.min(self.stream_len)).collect()
    }

    /// Every packet from the body start to the end of the stream.
    #[must_use]
    pub fn body_indices(&self) -> Vec<usize> {
        (self.body_start..self.stream_len).collect()
    }

    /// Packets the kernel scan kept.
    #[must_use]
    pub fn kernel_indices(&self) -> &[usize] {
        &self.kernel_indices
    }

    /// Packet that ended the kernel scan, if any.
    #[must_use]
    pub const fn branch_back(&self) -> Option<usize> {
        self.branch_back
    }

    /// Branch-back index, required by the nested controller.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnresolvedLoopMarker`] when the kernel scan ran
    /// off the end of the stream.
    pub const fn require_branch_back(&self) -> Result<usize, EngineError> {
        match self.branch_back {
            Some(index) => Ok(index),
            None => Err(EngineError::UnresolvedLoopMarker {
                start_index: self.body_start,
            }),
        }
    }

    /// Packets from the branch-back packet to the end of the stream.
    ///
    /// # Errors
    ///
    /// Same as [`LoopLayout::require_branch_back`].
    pub fn overlap_indices(&self) -> Result<Vec<usize>, EngineError> {
        let start = self.require_branch_back()?;
        Ok((start..self.stream_len).collect())
    }
}
