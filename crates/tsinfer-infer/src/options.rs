//! Knobs of one inference run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceOptions {
    /// Seed forward facts of compiler temporaries with their declared types.
    pub add_known_types: bool,
    /// Report inferred types of locals next to `this` and the arguments.
    pub infer_all_locals: bool,
    /// Propagate field writes to must-aliases of the written object.
    pub alias_analysis: bool,
    /// Drop forward facts on locals that are dead at the current statement.
    pub live_variables: bool,
    /// Resolve anonymous object shapes to declared classes.
    pub guess_types: bool,
    /// Deadline for each phase, in milliseconds. `None` waits forever.
    pub phase_timeout_ms: Option<u64>,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            add_known_types: true,
            infer_all_locals: true,
            alias_analysis: true,
            live_variables: true,
            guess_types: true,
            phase_timeout_ms: None,
        }
    }
}

impl InferenceOptions {
    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "../tests/options_tests.rs"]
mod tests;
