//! Command-line driver for the VLIW translation-block formation engine.

#[cfg(test)]
use tempfile as _;

/// Packet listing parser.
pub mod listing;
/// Mnemonic classification table.
pub mod mnemonic;
/// Text and JSON command reports.
pub mod report;
/// Input loading and command execution.
pub mod scenario;
/// Listing extraction from plain and literate files.
pub mod source;
/// `tracing` bridge for engine decision events.
pub mod trace_log;
