use crate::error::AnalysisError;
use std::fmt::Debug;

/// Out-of-band signals from the runner to its manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// The runner's work queue became empty (or non-empty again).
    QueueEmptinessChanged { is_empty: bool },
}

/// Receives analyzer events and control events from a running runner.
///
/// Implementations are shared between the orchestrating thread and the runner
/// thread, so every method takes `&self`.
pub trait Manager<E> {
    fn handle_event(&self, event: E);

    fn handle_control_event(&self, event: ControlEvent);

    /// Subscribe to summary edges produced by another analysis unit.
    ///
    /// Only single-unit analysis is supported; the default refuses.
    fn subscribe_on_summary_edges<M: Debug>(&self, method: M) -> Result<(), AnalysisError> {
        Err(AnalysisError::CrossUnitSubscription(format!("{method:?}")))
    }
}
