//! Runner configuration.

use serde::{Deserialize, Serialize};

use crate::diagnostic::DEFAULT_DIAGNOSTIC_LIMIT;

/// Default tick budget for [`BlueprintRunner::run`](crate::runner::BlueprintRunner::run).
pub const DEFAULT_MAX_TICKS: u64 = 10_000;

/// Tunables for a [`BlueprintRunner`](crate::runner::BlueprintRunner).
///
/// Every field has a default, so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Record a snapshot per tick, keeping this many. `None` disables history.
    pub history_capacity: Option<usize>,
    /// Tick budget used by `run()`.
    pub default_max_ticks: u64,
    /// Cap on diagnostics retained per frame.
    pub max_diagnostics: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            history_capacity: None,
            default_max_ticks: DEFAULT_MAX_TICKS,
            max_diagnostics: DEFAULT_DIAGNOSTIC_LIMIT,
        }
    }
}

impl RunnerConfig {
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.default_max_ticks = max_ticks;
        self
    }
}
