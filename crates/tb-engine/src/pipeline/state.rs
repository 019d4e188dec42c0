use std::fmt;

/// Pipeline stage of a software-pipelined loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Stage {
    /// Next step issues the loop prolog.
    #[default]
    Prolog,
    /// Steady state; pending kernel iterations are in `inner_count`.
    Kernel,
    /// Next step issues the overlapped epilog and the next prolog.
    Overlap,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Prolog => "prolog",
            Self::Kernel => "kernel",
            Self::Overlap => "overlap",
        })
    }
}

/// Loop counters passed into and returned from every controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PipelineState {
    /// Current stage.
    pub stage: Stage,
    /// Inner loop count (ILC).
    pub inner_count: u32,
    /// Inner loop reload count (RILC).
    pub reload_count: u32,
    /// Remaining outer iterations.
    pub outer_count: u32,
}

impl PipelineState {
    /// Completed state: `{Prolog, 0, 0, 0}`.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            stage: Stage::Prolog,
            inner_count: 0,
            reload_count: 0,
            outer_count: 0,
        }
    }

    /// Entry state for a single loop of `inner_count` iterations.
    #[must_use]
    pub const fn single(inner_count: u32) -> Self {
        Self {
            inner_count,
            ..Self::idle()
        }
    }

    /// Entry state for a nested loop.
    #[must_use]
    pub const fn nested(inner_count: u32, reload_count: u32, outer_count: u32) -> Self {
        Self {
            stage: Stage::Prolog,
            inner_count,
            reload_count,
            outer_count,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ILC={} RILC={} outer={}",
            self.stage, self.inner_count, self.reload_count, self.outer_count
        )
    }
}
