//! CLI entry point for the `vliw-dbt` binary.

use std::env;
use std::ffi::OsString;

use serde as _;
use serde_json as _;
use tb_cli as _;
use tb_cli::report::Report;
use tb_cli::scenario::{run_defer, run_form, run_loop, CliError, InputSource, LoopCounters};
use tb_cli::trace_log::{init_tracing, TracingSink};
use tb_engine::{CycleBudget, EngineConfig};
#[cfg(test)]
use tempfile as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

const USAGE_TEXT: &str = "\
Usage: vliw-dbt <command> <input> [options]

Commands:
  form  <input> [--budget N]                    Partition a straight-line stream into blocks
  loop  <input> [--ilc N] [--rilc N] [--outer N] Run a software-pipelined loop to completion
  defer <input>                                 Defer stores in every packet

Inputs:
  <path>          Listing file (.md files read ```vliw blocks)
  builtin:<name>  Reference program: straight, ldst, single, nested

Options:
  --budget N     Cycle budget of the first block (default: unbounded)
  --ilc N        Inner loop count (default: 8 single, 7 nested)
  --rilc N       Inner loop reload count (default: --ilc)
  --outer N      Outer iterations (default: 3)
  --json         Print the report as JSON
  -v, --verbose  Log engine decisions to stderr
  -h, --help     Show this help message

Examples:
  vliw-dbt form builtin:straight --budget 1000
  vliw-dbt loop builtin:nested --ilc 7 --outer 3 --json
  vliw-dbt defer kernel.vliw.md
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Form(FormArgs),
    Loop(LoopArgs),
    Defer(CommonArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct CommonArgs {
    input: String,
    json: bool,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct FormArgs {
    common: CommonArgs,
    budget: Option<u32>,
}

#[derive(Debug, PartialEq, Eq)]
struct LoopArgs {
    common: CommonArgs,
    counters: LoopCounters,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

#[derive(Debug, Default)]
struct ParsedOptions {
    input: Option<String>,
    json: bool,
    verbose: bool,
    values: Vec<(&'static str, u32)>,
}

impl ParsedOptions {
    fn value(&self, flag: &str) -> Option<u32> {
        self.values
            .iter()
            .rev()
            .find(|(name, _)| *name == flag)
            .map(|(_, value)| *value)
    }

    fn into_common(self) -> Result<CommonArgs, String> {
        let input = self.input.ok_or_else(|| "missing input".to_string())?;
        Ok(CommonArgs {
            input,
            json: self.json,
            verbose: self.verbose,
        })
    }
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    let command = match command_str.as_str() {
        "form" => {
            let options = parse_options(args, &["--budget"])?;
            let budget = options.value("--budget");
            Command::Form(FormArgs {
                common: options.into_common()?,
                budget,
            })
        }
        "loop" => {
            let options = parse_options(args, &["--ilc", "--rilc", "--outer"])?;
            let counters = LoopCounters {
                inner: options.value("--ilc"),
                reload: options.value("--rilc"),
                outer: options.value("--outer"),
            };
            Command::Loop(LoopArgs {
                common: options.into_common()?,
                counters,
            })
        }
        "defer" => Command::Defer(parse_options(args, &[])?.into_common()?),
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(ParseResult::Command(command))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_options(
    mut args: impl Iterator<Item = OsString>,
    numeric_flags: &[&'static str],
) -> Result<ParsedOptions, String> {
    let mut options = ParsedOptions::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            options.verbose = true;
            continue;
        }

        if arg == "--json" {
            options.json = true;
            continue;
        }

        let arg = arg.to_string_lossy().to_string();
        if let Some(&flag) = numeric_flags.iter().find(|flag| **flag == arg) {
            let raw = args
                .next()
                .ok_or_else(|| format!("missing value for {flag}"))?;
            let value = raw
                .to_string_lossy()
                .parse::<u32>()
                .map_err(|_| format!("invalid value for {flag}: {}", raw.to_string_lossy()))?;
            options.values.push((flag, value));
            continue;
        }

        if arg.starts_with('-') {
            return Err(format!("unknown option: {arg}"));
        }

        if options.input.is_some() {
            return Err("multiple inputs provided".to_string());
        }
        options.input = Some(arg);
    }

    Ok(options)
}

fn engine_config(verbose: bool, budget: Option<u32>) -> EngineConfig {
    let config = EngineConfig::default()
        .with_initial_budget(budget.map_or(CycleBudget::Unbounded, CycleBudget::Cycles));
    if verbose {
        config
    } else {
        config.silent()
    }
}

fn execute(command: Command, sink: &mut TracingSink) -> Result<(Report, bool), CliError> {
    match command {
        Command::Form(args) => {
            let source = InputSource::from_arg(&args.common.input)?;
            let packets = source.load()?;
            let config = engine_config(args.common.verbose, args.budget);
            Ok((run_form(&source, &packets, &config, sink), args.common.json))
        }
        Command::Loop(args) => {
            let source = InputSource::from_arg(&args.common.input)?;
            let packets = source.load()?;
            let config = engine_config(args.common.verbose, None);
            let report = run_loop(&source, &packets, args.counters, config, sink)?;
            Ok((report, args.common.json))
        }
        Command::Defer(args) => {
            let source = InputSource::from_arg(&args.input)?;
            let packets = source.load()?;
            let config = engine_config(args.verbose, None);
            Ok((run_defer(&source, &packets, &config, sink), args.json))
        }
    }
}

const fn is_verbose(command: &Command) -> bool {
    match command {
        Command::Form(FormArgs { common, .. })
        | Command::Loop(LoopArgs { common, .. })
        | Command::Defer(common) => common.verbose,
    }
}

fn run(command: Command) -> Result<(), i32> {
    init_tracing(is_verbose(&command));
    let mut sink = TracingSink::new();

    let rendered = execute(command, &mut sink).and_then(|(report, json)| {
        if json {
            Ok(report.to_json()?)
        } else {
            Ok(report.to_string())
        }
    });

    match rendered {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => match run(command) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
