//! Human-readable and JSON renderings of command results.

use std::fmt;

use serde::Serialize;

use tb_engine::{
    BlockLog, CycleBudget, ExecutePacket, PipelineState, RunSummary, StraightLineRun, StreamShape,
    TranslationBlock,
};

/// Result of `form`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StraightLineReport {
    /// Input the packets came from.
    pub source: String,
    /// Packets in the stream.
    pub packets: usize,
    /// Budget of the first block.
    pub initial_budget: CycleBudget,
    /// Blocks and leftover delay contexts.
    pub run: StraightLineRun,
}

/// Result of `loop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopReport {
    /// Input the packets came from.
    pub source: String,
    /// Controller the stream was routed to.
    pub shape: StreamShape,
    /// Counters before the first step.
    pub initial: PipelineState,
    /// Step reports.
    pub summary: RunSummary,
    /// Blocks the controller translated.
    pub blocks: BlockLog,
}

/// One packet before and after store deferral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketDeferral {
    /// Packet as listed.
    pub original: ExecutePacket,
    /// Packet with stores deferred.
    pub translated: ExecutePacket,
}

/// Command result, tagged by command in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Report {
    /// Straight-line partition.
    Form(StraightLineReport),
    /// Loop controller run.
    Loop(LoopReport),
    /// Per-packet store deferral.
    Defer {
        /// Input the packets came from.
        source: String,
        /// Every packet, in stream order.
        packets: Vec<PacketDeferral>,
    },
}

impl Report {
    /// Pretty-printed JSON encoding.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` encoding failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

const fn shape_name(shape: StreamShape) -> &'static str {
    match shape {
        StreamShape::StraightLine => "straight-line",
        StreamShape::SingleLoop => "single loop",
        StreamShape::NestedLoop => "nested loop",
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &TranslationBlock) -> fmt::Result {
    let label = block
        .label()
        .map_or_else(String::new, |label| format!(" [{label}]"));
    let span = match (block.packets().first(), block.packets().last()) {
        (Some(first), Some(last)) => format!("EP{}..EP{}", first.sequence(), last.sequence()),
        _ => "empty".to_owned(),
    };
    writeln!(
        f,
        "  {}{label}  {span}  budget {}  cycles {}",
        block.id(),
        block.cycle_budget(),
        block.total_cycles()
    )?;
    for packet in block.packets() {
        writeln!(f, "    {packet}")?;
    }
    Ok(())
}

impl fmt::Display for StraightLineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Translated {} block(s) from {} ({} packets, first budget {})",
            self.run.blocks.len(),
            self.source,
            self.packets,
            self.initial_budget
        )?;
        for block in &self.run.blocks {
            write_block(f, block)?;
        }
        write!(f, "Live delay contexts: {}", self.run.live_contexts.len())
    }
}

impl fmt::Display for LoopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) starting at {}",
            self.source,
            shape_name(self.shape),
            self.initial
        )?;
        for (step, report) in self.summary.steps.iter().enumerate() {
            writeln!(f, "Step {} -> {}", step + 1, report.state)?;
            for execution in &report.executions {
                let label = execution
                    .label
                    .map_or_else(|| "unlabeled".to_owned(), |label| label.to_string());
                let action = if execution.translated { "translated" } else { "reused" };
                writeln!(f, "  {} [{label}] x{} {action}", execution.block, execution.times)?;
            }
        }
        for block in &self.blocks {
            write_block(f, block)?;
        }
        write!(
            f,
            "Translated {} block(s), {} body execution(s)",
            self.blocks.len(),
            self.summary.body_executions()
        )
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Form(report) => fmt::Display::fmt(report, f),
            Self::Loop(report) => fmt::Display::fmt(report, f),
            Self::Defer { source, packets } => {
                write!(f, "Deferred stores in {} packet(s) from {source}", packets.len())?;
                for deferral in packets {
                    write!(f, "\n  {}\n  -> {}", deferral.original, deferral.translated)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tb_engine::{EngineConfig, NoopTraceSink};

    use crate::scenario::{run_defer, run_form, Builtin, InputSource};

    #[test]
    fn form_text_lists_every_block() {
        let source = InputSource::Builtin(Builtin::Straight);
        let packets = source.load().expect("builtin loads");
        let report = run_form(
            &source,
            &packets,
            &EngineConfig::default().silent(),
            &mut NoopTraceSink,
        );
        let text = report.to_string();
        assert!(text.starts_with("Translated 3 block(s) from builtin:straight"));
        assert!(text.contains("TB0  EP1..EP6  budget unbounded"));
        assert!(text.ends_with("Live delay contexts: 7"));
    }

    #[test]
    fn defer_json_is_tagged() {
        let source = InputSource::Builtin(Builtin::Ldst);
        let packets = source.load().expect("builtin loads");
        let report = run_defer(
            &source,
            &packets,
            &EngineConfig::default().silent(),
            &mut NoopTraceSink,
        );
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("encodes")).expect("valid json");
        assert_eq!(json["command"], "defer");
        assert_eq!(json["packets"].as_array().map(Vec::len), Some(1));
    }
}
