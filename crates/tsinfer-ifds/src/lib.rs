//! Interprocedural, finite, distributive, subset (IFDS) dataflow machinery.
//!
//! The crate is generic over the program representation: anything that
//! implements [`ApplicationGraph`] can be analyzed by any pair of
//! [`FlowFunctions`] / [`Analyzer`] implementations. The [`UniRunner`] builds
//! the exploded supergraph lazily with the tabulation algorithm and reports
//! analyzer events and queue-emptiness control events to a [`Manager`].
//!
//! Everything is statically dispatched: the runner is monomorphized per
//! analyzer, so the per-statement hot path never goes through a vtable.

pub mod edge;
pub mod error;
pub mod flow;
pub mod gate;
pub mod graph;
pub mod manager;
pub mod runner;

pub use edge::{Edge, Vertex};
pub use error::AnalysisError;
pub use flow::{Analyzer, FlowFunctions, FlowResult};
pub use gate::{GateOutcome, PhaseGate};
pub use graph::ApplicationGraph;
pub use manager::{ControlEvent, Manager};
pub use runner::{IfdsResult, UniRunner};
