//! Packet listing parser.
//!
//! One instruction per line:
//!
//! ```text
//! [||] [[pred]] MNEMONIC [.unit] [operands...] [@delay=N] [@cycles=N] [; comment]
//! ```
//!
//! A line without `||` starts a new execute packet; a `||` line joins the
//! packet above it. Every branch must carry `@delay`; a missing or negative
//! count is rejected with its line. A packet costs the largest cycle count
//! of its instructions, where `NOP n` costs `n` and everything else costs 1
//! unless `@cycles` says so.

use thiserror::Error;

use tb_engine::{EngineError, Instruction, InstructionKind, PacketStream};

use crate::mnemonic::classify_mnemonic;
use crate::source::SourceLine;

const PARALLEL_PREFIX: &str = "||";
const DELAY_ANNOTATION: &str = "@delay=";
const CYCLES_ANNOTATION: &str = "@cycles=";

/// Listing parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    /// A `||` line appeared before any packet was started.
    #[error("line {line}: `||` continues a packet but no packet has started")]
    OrphanParallel {
        /// 1-indexed source line.
        line: usize,
    },
    /// A `[` predicate was not closed.
    #[error("line {line}: unterminated predicate `{text}`")]
    UnterminatedPredicate {
        /// 1-indexed source line.
        line: usize,
        /// Offending text.
        text: String,
    },
    /// Line held a prefix or predicate but no mnemonic.
    #[error("line {line}: missing mnemonic")]
    MissingMnemonic {
        /// 1-indexed source line.
        line: usize,
    },
    /// An `@` annotation was unknown or carried a bad value.
    #[error("line {line}: invalid annotation `{text}`")]
    InvalidAnnotation {
        /// 1-indexed source line.
        line: usize,
        /// Offending annotation.
        text: String,
    },
    /// The engine rejected the instruction or packet.
    #[error("line {line}: {source}")]
    Engine {
        /// 1-indexed source line.
        line: usize,
        /// Engine validation error.
        #[source]
        source: EngineError,
    },
    /// The listing held no instructions at all.
    #[error("listing contains no execute packets")]
    Empty,
}

impl ListingError {
    /// Source line of the failure, when there is one.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::OrphanParallel { line }
            | Self::UnterminatedPredicate { line, .. }
            | Self::MissingMnemonic { line }
            | Self::InvalidAnnotation { line, .. }
            | Self::Engine { line, .. } => Some(*line),
            Self::Empty => None,
        }
    }
}

/// One parsed instruction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// 1-indexed source line.
    pub line: usize,
    /// Joins the previous packet.
    pub parallel: bool,
    /// Guard predicate, brackets included.
    pub predicate: Option<String>,
    /// Mnemonic as written.
    pub mnemonic: String,
    /// Functional unit, empty when absent.
    pub unit: String,
    /// Operand text with single-space separation.
    pub operands: String,
    /// Explicit `@delay` value.
    pub delay: Option<i64>,
    /// Explicit `@cycles` value.
    pub cycles: Option<u32>,
}

impl ParsedLine {
    /// Kind derived from the mnemonic table.
    #[must_use]
    pub fn kind(&self) -> InstructionKind {
        classify_mnemonic(&self.mnemonic)
    }

    /// Cycles this instruction asks its packet to occupy.
    #[must_use]
    pub fn cycle_cost(&self) -> u32 {
        if let Some(cycles) = self.cycles {
            return cycles;
        }
        if self.kind() == InstructionKind::NoOp {
            if let Ok(count) = self.operands.parse::<u32>() {
                return count.max(1);
            }
        }
        1
    }

    /// Builds the engine instruction.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::Engine`] when the engine rejects it, including
    /// a branch written without `@delay`.
    pub fn to_instruction(&self) -> Result<Instruction, ListingError> {
        let mut builder = Instruction::builder(self.kind(), self.mnemonic.clone())
            .unit(self.unit.clone())
            .operands(self.operands.clone())
            .line(u32::try_from(self.line).unwrap_or(u32::MAX))
            .parallel(self.parallel);
        if let Some(delay) = self.delay {
            builder = builder.delay_slots(delay);
        }
        if let Some(predicate) = &self.predicate {
            builder = builder.predicate(predicate.clone());
        }
        builder.build().map_err(|source| ListingError::Engine {
            line: self.line,
            source,
        })
    }
}

fn strip_comment(text: &str) -> &str {
    text.split_once(';').map_or(text, |(code, _)| code)
}

fn parse_annotation(token: &str, line: usize, parsed: &mut ParsedLine) -> Result<(), ListingError> {
    let invalid = || ListingError::InvalidAnnotation {
        line,
        text: token.to_owned(),
    };
    if let Some(value) = token.strip_prefix(DELAY_ANNOTATION) {
        parsed.delay = Some(value.parse().map_err(|_| invalid())?);
    } else if let Some(value) = token.strip_prefix(CYCLES_ANNOTATION) {
        parsed.cycles = Some(value.parse().map_err(|_| invalid())?);
    } else {
        return Err(invalid());
    }
    Ok(())
}

/// Parses one listing line; blank and comment-only lines yield `None`.
///
/// # Errors
///
/// Returns a [`ListingError`] for malformed predicates, missing mnemonics and
/// bad annotations.
pub fn parse_line(text: &str, line: usize) -> Result<Option<ParsedLine>, ListingError> {
    let mut rest = strip_comment(text).trim();
    if rest.is_empty() {
        return Ok(None);
    }

    let parallel = match rest.strip_prefix(PARALLEL_PREFIX) {
        Some(after) => {
            rest = after.trim_start();
            true
        }
        None => false,
    };

    let mut predicate = None;
    if rest.starts_with('[') {
        let (guard, after) = rest
            .split_once(']')
            .ok_or_else(|| ListingError::UnterminatedPredicate {
                line,
                text: rest.to_owned(),
            })?;
        predicate = Some(format!("{guard}]"));
        rest = after.trim_start();
    }

    let mut tokens = rest.split_whitespace().peekable();
    let mnemonic = tokens
        .next()
        .filter(|token| !token.starts_with('@'))
        .ok_or(ListingError::MissingMnemonic { line })?;
    let unit = tokens
        .next_if(|token| token.starts_with('.'))
        .unwrap_or_default();

    let mut parsed = ParsedLine {
        line,
        parallel,
        predicate,
        mnemonic: mnemonic.to_owned(),
        unit: unit.to_owned(),
        operands: String::new(),
        delay: None,
        cycles: None,
    };
    let mut operands = Vec::new();
    for token in tokens {
        if token.starts_with('@') {
            parse_annotation(token, line, &mut parsed)?;
        } else {
            operands.push(token);
        }
    }
    parsed.operands = operands.join(" ");
    Ok(Some(parsed))
}

struct PendingPacket {
    line: usize,
    cycle_cost: u32,
    instructions: Vec<Instruction>,
}

fn flush(stream: &mut PacketStream, packet: PendingPacket) -> Result<(), ListingError> {
    stream
        .push(packet.cycle_cost, packet.instructions)
        .map(|_| ())
        .map_err(|source| ListingError::Engine {
            line: packet.line,
            source,
        })
}

/// Groups listing lines into a numbered packet stream.
///
/// # Errors
///
/// Returns the first [`ListingError`] encountered, or
/// [`ListingError::Empty`] when no instruction was found.
pub fn parse_listing(lines: &[SourceLine]) -> Result<PacketStream, ListingError> {
    let mut stream = PacketStream::new();
    let mut pending: Option<PendingPacket> = None;

    for source in lines {
        let Some(parsed) = parse_line(&source.text, source.original_line)? else {
            continue;
        };
        let instruction = parsed.to_instruction()?;
        let cycle_cost = parsed.cycle_cost();

        if parsed.parallel {
            let packet = pending
                .as_mut()
                .ok_or(ListingError::OrphanParallel { line: parsed.line })?;
            packet.cycle_cost = packet.cycle_cost.max(cycle_cost);
            packet.instructions.push(instruction);
        } else {
            let started = PendingPacket {
                line: parsed.line,
                cycle_cost,
                instructions: vec![instruction],
            };
            if let Some(previous) = pending.replace(started) {
                flush(&mut stream, previous)?;
            }
        }
    }

    if let Some(last) = pending {
        flush(&mut stream, last)?;
    }
    if stream.is_empty() {
        return Err(ListingError::Empty);
    }
    Ok(stream)
}
