//! Input loading and the three driver commands.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use tb_engine::fixtures::{
    load_store_packet, nested_loop_program, single_loop_program, straight_line_program,
    NESTED_INNER_ITERATIONS, NESTED_OUTER_ITERATIONS, NESTED_RELOAD_ITERATIONS,
    SINGLE_LOOP_ITERATIONS,
};
use tb_engine::{
    classify, translate_packet, translate_straight_line, EngineConfig, EngineError, GatedSink,
    LoopController, NestedLoopController, PacketStream, PipelineState, SingleLoopController,
    StreamShape, TraceSink,
};

use crate::listing::{parse_listing, ListingError};
use crate::report::{LoopReport, PacketDeferral, Report, StraightLineReport};
use crate::source::extract_source;

/// Prefix selecting a built-in program instead of a listing file.
pub const BUILTIN_PREFIX: &str = "builtin:";

/// Driver failure.
#[derive(Debug, Error)]
pub enum CliError {
    /// The listing file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Listing path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The listing file did not parse.
    #[error("{}: {source}", path.display())]
    Listing {
        /// Listing path.
        path: PathBuf,
        /// Parse failure with its line.
        #[source]
        source: ListingError,
    },
    /// The engine rejected the program.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The JSON report could not be encoded.
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
    /// `builtin:` named no known program.
    #[error("unknown builtin `{0}` (expected straight, ldst, single or nested)")]
    UnknownBuiltin(String),
    /// `loop` was given a program without loop markers.
    #[error("{0} has no software-pipelined loop")]
    NotALoop(String),
}

/// Built-in reference programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Thirteen-packet straight-line program.
    Straight,
    /// Single load/store packet.
    Ldst,
    /// Single software-pipelined loop.
    Single,
    /// Nested software-pipelined loop.
    Nested,
}

impl Builtin {
    /// Every built-in program.
    pub const ALL: [Self; 4] = [Self::Straight, Self::Ldst, Self::Single, Self::Nested];

    /// Name used after `builtin:`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Straight => "straight",
            Self::Ldst => "ldst",
            Self::Single => "single",
            Self::Nested => "nested",
        }
    }

    /// Looks up a built-in by name.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::UnknownBuiltin`] for any other name.
    pub fn from_name(name: &str) -> Result<Self, CliError> {
        Self::ALL
            .into_iter()
            .find(|builtin| builtin.name() == name)
            .ok_or_else(|| CliError::UnknownBuiltin(name.to_owned()))
    }

    fn load(self) -> Result<PacketStream, EngineError> {
        match self {
            Self::Straight => straight_line_program(),
            Self::Ldst => PacketStream::from_packets(vec![load_store_packet()?]),
            Self::Single => single_loop_program(),
            Self::Nested => nested_loop_program(),
        }
    }
}

/// Where a command reads its packets from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A built-in reference program.
    Builtin(Builtin),
    /// A plain or literate listing file.
    File(PathBuf),
}

impl InputSource {
    /// Interprets a command-line `<input>` argument.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::UnknownBuiltin`] for an unknown `builtin:` name.
    pub fn from_arg(arg: &str) -> Result<Self, CliError> {
        match arg.strip_prefix(BUILTIN_PREFIX) {
            Some(name) => Builtin::from_name(name).map(Self::Builtin),
            None => Ok(Self::File(PathBuf::from(arg))),
        }
    }

    /// Loads and numbers the packets.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] on read, parse or construction failure.
    pub fn load(&self) -> Result<PacketStream, CliError> {
        match self {
            Self::Builtin(builtin) => Ok(builtin.load()?),
            Self::File(path) => {
                let content = fs::read_to_string(path).map_err(|source| CliError::Io {
                    path: path.clone(),
                    source,
                })?;
                let lines = extract_source(path, &content);
                parse_listing(&lines).map_err(|source| CliError::Listing {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(builtin) => write!(f, "{BUILTIN_PREFIX}{}", builtin.name()),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Loop counters given on the command line; `None` takes the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopCounters {
    /// Inner loop count.
    pub inner: Option<u32>,
    /// Inner loop reload count, defaults to the inner count.
    pub reload: Option<u32>,
    /// Outer iterations.
    pub outer: Option<u32>,
}

impl LoopCounters {
    /// Initial pipeline state for a stream of `shape`.
    ///
    /// Single loops default to 8 iterations; nested loops to 7 inner and 3
    /// outer iterations.
    #[must_use]
    pub fn initial_state(self, shape: StreamShape) -> PipelineState {
        match shape {
            StreamShape::NestedLoop => {
                let inner = self.inner.unwrap_or(NESTED_INNER_ITERATIONS);
                let reload = self.reload.or(self.inner).unwrap_or(NESTED_RELOAD_ITERATIONS);
                PipelineState::nested(inner, reload, self.outer.unwrap_or(NESTED_OUTER_ITERATIONS))
            }
            StreamShape::SingleLoop | StreamShape::StraightLine => {
                PipelineState::single(self.inner.unwrap_or(SINGLE_LOOP_ITERATIONS))
            }
        }
    }
}

/// Partitions the whole stream into blocks.
#[must_use]
pub fn run_form(
    source: &InputSource,
    packets: &PacketStream,
    config: &EngineConfig,
    sink: &mut dyn TraceSink,
) -> Report {
    let run = translate_straight_line(packets.as_slice(), config, sink);
    Report::Form(StraightLineReport {
        source: source.to_string(),
        packets: packets.len(),
        initial_budget: config.initial_budget,
        run,
    })
}

/// Drives the loop controller matching the stream's shape to completion.
///
/// # Errors
///
/// Returns [`CliError::NotALoop`] for straight-line streams and
/// [`CliError::Engine`] when the loop markers cannot be resolved.
pub fn run_loop(
    source: &InputSource,
    packets: &PacketStream,
    counters: LoopCounters,
    config: EngineConfig,
    sink: &mut dyn TraceSink,
) -> Result<Report, CliError> {
    let shape = classify(packets.as_slice());
    let initial = counters.initial_state(shape);
    let (summary, blocks) = match shape {
        StreamShape::StraightLine => return Err(CliError::NotALoop(source.to_string())),
        StreamShape::SingleLoop => {
            let mut controller = SingleLoopController::new(config);
            let summary = controller.run(packets.as_slice(), initial, sink)?;
            (summary, controller.blocks().clone())
        }
        StreamShape::NestedLoop => {
            let mut controller = NestedLoopController::new(config);
            let summary = controller.run(packets.as_slice(), initial, sink)?;
            (summary, controller.blocks().clone())
        }
    };
    Ok(Report::Loop(LoopReport {
        source: source.to_string(),
        shape,
        initial,
        summary,
        blocks,
    }))
}

/// Applies store deferral to every packet independently.
#[must_use]
pub fn run_defer(
    source: &InputSource,
    packets: &PacketStream,
    config: &EngineConfig,
    sink: &mut dyn TraceSink,
) -> Report {
    let mut sink = GatedSink::new(sink, config.tracing_enabled);
    let packets = packets
        .as_slice()
        .iter()
        .map(|packet| PacketDeferral {
            translated: translate_packet(packet, &mut sink),
            original: packet.clone(),
        })
        .collect();
    Report::Defer {
        source: source.to_string(),
        packets,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tb_engine::{EngineConfig, NoopTraceSink, PipelineState, StreamShape, TraceEvent};

    use super::{run_defer, run_loop, Builtin, CliError, InputSource, LoopCounters};
    use crate::report::Report;

    #[test]
    fn parses_builtin_and_file_inputs() {
        assert_eq!(
            InputSource::from_arg("builtin:nested").expect("known builtin"),
            InputSource::Builtin(Builtin::Nested)
        );
        assert_eq!(
            InputSource::from_arg("loops/dot.lst").expect("path"),
            InputSource::File(PathBuf::from("loops/dot.lst"))
        );
        assert!(matches!(
            InputSource::from_arg("builtin:fft"),
            Err(CliError::UnknownBuiltin(name)) if name == "fft"
        ));
    }

    #[test]
    fn every_builtin_loads() {
        for builtin in Builtin::ALL {
            let stream = InputSource::Builtin(builtin).load().expect("builtin loads");
            assert!(!stream.is_empty(), "{}", builtin.name());
        }
    }

    #[test]
    fn missing_file_reports_io_error() {
        let source = InputSource::File(PathBuf::from("/nonexistent/listing.lst"));
        assert!(matches!(source.load(), Err(CliError::Io { .. })));
    }

    #[test]
    fn counter_defaults_follow_shape() {
        assert_eq!(
            LoopCounters::default().initial_state(StreamShape::SingleLoop),
            PipelineState::single(8)
        );
        assert_eq!(
            LoopCounters::default().initial_state(StreamShape::NestedLoop),
            PipelineState::nested(7, 7, 3)
        );
        let counters = LoopCounters {
            inner: Some(4),
            reload: None,
            outer: Some(2),
        };
        assert_eq!(
            counters.initial_state(StreamShape::NestedLoop),
            PipelineState::nested(4, 4, 2)
        );
    }

    #[test]
    fn loop_rejects_straight_line_program() {
        let source = InputSource::Builtin(Builtin::Straight);
        let packets = source.load().expect("builtin loads");
        let result = run_loop(
            &source,
            &packets,
            LoopCounters::default(),
            EngineConfig::default().silent(),
            &mut NoopTraceSink,
        );
        assert!(matches!(result, Err(CliError::NotALoop(_))));
    }

    #[test]
    fn nested_builtin_translates_three_blocks() {
        let source = InputSource::Builtin(Builtin::Nested);
        let packets = source.load().expect("builtin loads");
        let report = run_loop(
            &source,
            &packets,
            LoopCounters::default(),
            EngineConfig::default().silent(),
            &mut NoopTraceSink,
        )
        .expect("nested loop runs");
        let Report::Loop(report) = report else {
            panic!("expected a loop report");
        };
        assert_eq!(report.blocks.len(), 3);
        assert_eq!(report.summary.body_executions(), 21);
    }

    #[test]
    fn defer_honours_tracing_switch() {
        let source = InputSource::Builtin(Builtin::Ldst);
        let packets = source.load().expect("builtin loads");

        let mut silent: Vec<TraceEvent> = Vec::new();
        let report = run_defer(&source, &packets, &EngineConfig::default().silent(), &mut silent);
        assert!(silent.is_empty());
        assert!(matches!(report, Report::Defer { ref packets, .. } if packets.len() == 1));

        let mut traced: Vec<TraceEvent> = Vec::new();
        let _ = run_defer(&source, &packets, &EngineConfig::default(), &mut traced);
        assert!(!traced.is_empty());
        assert!(traced
            .iter()
            .all(|event| matches!(event, TraceEvent::StoreDeferred { .. })));
    }
}
