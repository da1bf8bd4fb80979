//! Solver backend configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the solver backend and the sessions it creates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Wall-clock budget per satisfiability check. A check that runs past
    /// the budget reports unknown, never unsatisfiable.
    pub timeout: Option<Duration>,
}

impl SolverConfig {
    /// The default configuration: no timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a per-check timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a per-check timeout in milliseconds.
    #[must_use]
    pub fn with_timeout_ms(self, millis: u64) -> Self {
        self.with_timeout(Duration::from_millis(millis))
    }
}
