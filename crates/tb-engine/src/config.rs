use crate::CycleBudget;

/// Top-level configuration shared by the runner and the loop controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EngineConfig {
    /// Budget of the first block of a straight-line run.
    pub initial_budget: CycleBudget,
    /// Stores translated packets (stores deferred) into every block.
    pub defer_stores: bool,
    /// Enables trace callback dispatch.
    pub tracing_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_budget: CycleBudget::Unbounded,
            defer_stores: true,
            tracing_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Same configuration with a different first-block budget.
    #[must_use]
    pub const fn with_initial_budget(self, initial_budget: CycleBudget) -> Self {
        Self {
            initial_budget,
            ..self
        }
    }

    /// Same configuration with trace dispatch switched off.
    #[must_use]
    pub const fn silent(self) -> Self {
        Self {
            tracing_enabled: false,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;
    use crate::CycleBudget;

    #[test]
    fn default_config_defers_stores_without_a_first_budget() {
        let config = EngineConfig::default();
        assert_eq!(config.initial_budget, CycleBudget::Unbounded);
        assert!(config.defer_stores);
        assert!(config.tracing_enabled);
    }

    #[test]
    fn builders_only_touch_their_field() {
        let config = EngineConfig::default()
            .with_initial_budget(CycleBudget::Cycles(12))
            .silent();
        assert_eq!(config.initial_budget, CycleBudget::Cycles(12));
        assert!(config.defer_stores);
        assert!(!config.tracing_enabled);
    }
}
