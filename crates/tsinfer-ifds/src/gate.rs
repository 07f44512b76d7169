//! One-shot completion gate awaited by the orchestrator once per phase.

use crate::error::AnalysisError;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Completed,
    TimedOut,
}

#[derive(Debug)]
enum GateState {
    Pending,
    Completed,
    Failed(AnalysisError),
}

/// A completion signal that can be satisfied at most once until reset.
///
/// The first `complete`/`fail` wins; later calls are ignored.
#[derive(Debug)]
pub struct PhaseGate {
    state: Mutex<GateState>,
    signal: Condvar,
}

impl Default for PhaseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseGate {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending),
            signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-arm the gate for the next phase.
    pub fn reset(&self) {
        *self.lock() = GateState::Pending;
    }

    pub fn complete(&self) {
        let mut state = self.lock();
        if matches!(*state, GateState::Pending) {
            *state = GateState::Completed;
            self.signal.notify_all();
        }
    }

    pub fn fail(&self, error: AnalysisError) {
        let mut state = self.lock();
        if matches!(*state, GateState::Pending) {
            *state = GateState::Failed(error);
            self.signal.notify_all();
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.lock(), GateState::Pending)
    }

    /// Block until the gate is completed or failed, or until `timeout` passes.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<GateOutcome, AnalysisError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        loop {
            match &*state {
                GateState::Completed => return Ok(GateOutcome::Completed),
                GateState::Failed(error) => return Err(error.clone()),
                GateState::Pending => {}
            }
            match deadline {
                None => {
                    state = self
                        .signal
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(GateOutcome::TimedOut);
                    }
                    state = self
                        .signal
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/gate_tests.rs"]
mod tests;
