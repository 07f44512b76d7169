//! Append-only collection of diagnostics shared by the analyzers and the
//! orchestrator.

use std::sync::{Mutex, PoisonError};
use tsinfer_common::Diagnostic;

#[derive(Debug, Default)]
pub struct DiagnosticSink {
    records: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `diagnostic` and mirror it to `tracing`.
    ///
    /// A diagnostic equal to one already recorded is traced but not stored
    /// again: flow functions run once per propagated edge and would otherwise
    /// report the same anomaly many times.
    pub fn report(&self, diagnostic: Diagnostic) {
        diagnostic.emit_trace();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if !records.contains(&diagnostic) {
            records.push(diagnostic);
        }
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything recorded so far, in report order.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
#[path = "../tests/sink_tests.rs"]
mod tests;
