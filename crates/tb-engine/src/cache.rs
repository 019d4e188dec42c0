//! Stage-labeled translation-block cache.

use std::fmt;

use crate::{BlockId, BlockLog, EngineError, TranslationBlock};

/// Number of stage labels; the cache table has one slot per label.
pub const STAGE_LABEL_COUNT: usize = 3;

/// Pipeline stage a cached block was translated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StageLabel {
    /// Loop prolog.
    Prolog,
    /// Steady-state loop body.
    Kernel,
    /// Epilog of one outer iteration overlapped with the next prolog.
    Overlap,
}

impl StageLabel {
    /// All labels in table order.
    pub const ALL: [Self; STAGE_LABEL_COUNT] = [Self::Prolog, Self::Kernel, Self::Overlap];

    /// Table slot of this label.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Prolog => 0,
            Self::Kernel => 1,
            Self::Overlap => 2,
        }
    }

    /// Stable lowercase name used in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prolog => "prolog",
            Self::Kernel => "kernel",
            Self::Overlap => "overlap",
        }
    }
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a cache lookup that translates on miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CacheOutcome {
    /// Block was translated and inserted by this call.
    Translated(BlockId),
    /// Block was already cached.
    Reused(BlockId),
}

impl CacheOutcome {
    /// Block identifier in either case.
    #[must_use]
    pub const fn id(self) -> BlockId {
        match self {
            Self::Translated(id) | Self::Reused(id) => id,
        }
    }

    /// Returns `true` on a cache hit.
    #[must_use]
    pub const fn was_reused(self) -> bool {
        matches!(self, Self::Reused(_))
    }
}

/// Fixed table mapping each stage label to at most one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TbCache {
    entries: [Option<BlockId>; STAGE_LABEL_COUNT],
}

impl TbCache {
    /// Empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [None; STAGE_LABEL_COUNT],
        }
    }

    /// Block cached under `label`.
    #[must_use]
    pub const fn lookup(&self, label: StageLabel) -> Option<BlockId> {
        self.entries[label.index()]
    }

    /// Caches `id` under `label`, returning the block it displaced.
    pub fn insert(&mut self, label: StageLabel, id: BlockId) -> Option<BlockId> {
        self.entries[label.index()].replace(id)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// Returns `true` when no label is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied slots in label order.
    pub fn iter(&self) -> impl Iterator<Item = (StageLabel, BlockId)> + '_ {
        StageLabel::ALL
            .into_iter()
            .filter_map(|label| self.lookup(label).map(|id| (label, id)))
    }

    /// Returns the block cached under `label`, or translates one with the
    /// log's next id, appends it to `log`, and caches it.
    ///
    /// # Errors
    ///
    /// Propagates the error of `translate`; the cache and log are unchanged.
    pub fn get_or_translate<F>(
        &mut self,
        label: StageLabel,
        log: &mut BlockLog,
        translate: F,
    ) -> Result<CacheOutcome, EngineError>
    where
        F: FnOnce(BlockId) -> Result<TranslationBlock, EngineError>,
    {
        if let Some(id) = self.lookup(label) {
            return Ok(CacheOutcome::Reused(id));
        }
        let block = translate(log.next_id())?;
        let id = log.push(block);
        self.insert(label, id);
        Ok(CacheOutcome::Translated(id))
    }
}
