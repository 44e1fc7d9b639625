//! Runtime knobs for the engine itself. Ledger parameters live in `LedgerConfig`.

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Audit events kept in memory; the oldest are dropped first.
    pub max_events: usize,
    /// Echo every published event to stdout.
    pub verbose: bool,
}

impl EngineConfig {
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
        }
    }
}
