//! Bridges engine decision events onto `tracing`.

use tb_engine::{TraceEvent, TraceSink};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset and `--verbose` is given.
pub const VERBOSE_FILTER: &str = "debug";
/// Filter used when `RUST_LOG` is unset otherwise.
pub const QUIET_FILTER: &str = "warn";

/// Installs the stderr `fmt` subscriber.
///
/// `RUST_LOG` wins over `verbose`. Returns `false` when a global subscriber
/// was already installed.
pub fn init_tracing(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { VERBOSE_FILTER } else { QUIET_FILTER }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Trace sink that logs every event with structured fields.
///
/// Block-level decisions log at `info`, per-packet decisions at `debug`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TracingSink {
    events: usize,
}

impl TracingSink {
    /// Creates a sink with no events seen.
    #[must_use]
    pub const fn new() -> Self {
        Self { events: 0 }
    }

    /// Events forwarded so far.
    #[must_use]
    pub const fn events(&self) -> usize {
        self.events
    }
}

impl TraceSink for TracingSink {
    fn on_event(&mut self, event: TraceEvent) {
        self.events += 1;
        match event {
            TraceEvent::StoreDeferred {
                sequence,
                source_line,
            } => debug!(sequence, source_line, "store deferred"),
            TraceEvent::DelayContextSaved {
                sequence,
                origin_line,
                remaining_delay,
            } => debug!(sequence, origin_line, remaining_delay, "delay context saved"),
            TraceEvent::BudgetClipped {
                sequence,
                remaining,
            } => debug!(sequence, remaining, "budget clipped by branch delay"),
            TraceEvent::PacketDoesNotFit {
                sequence,
                cycle_cost,
                remaining,
            } => debug!(sequence, cycle_cost, remaining, "packet does not fit"),
            TraceEvent::BudgetExhausted { sequence } => debug!(sequence, "budget exhausted"),
            TraceEvent::BlockFormed {
                id,
                label,
                start_index,
                end_index,
                packets,
                budget,
            } => info!(
                %id,
                label = ?label,
                start_index,
                end_index = ?end_index,
                packets,
                %budget,
                "block formed"
            ),
            TraceEvent::NextBudgetDerived {
                budget,
                live_contexts,
                pruned,
            } => debug!(%budget, live_contexts, pruned, "next budget derived"),
            TraceEvent::BlockReused { id, label } => info!(%id, %label, "block reused"),
            TraceEvent::BlockExecuted { id, times } => debug!(%id, times, "block executed"),
            TraceEvent::StageChanged { from, to } => info!(%from, %to, "stage changed"),
            TraceEvent::LoopCompleted { translated_blocks } => {
                info!(translated_blocks, "loop completed");
            }
        }
    }
}
