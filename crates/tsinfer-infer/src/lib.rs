//! Interprocedural type inference over the IR.
//!
//! A backward phase collects what each method requires of its arguments,
//! `this` and statics; a forward phase seeded with those requirements
//! observes what actually flows in. The [`TypeInferenceManager`] runs both
//! and combines their summaries into a [`TypeInferenceResult`].
//!
//! Supporting analyses:
//! - [`aliases`]: intraprocedural must-aliases of access paths
//! - [`guards`]: `typeof` guards dominating a statement
//! - [`cache`]: per-method memoization of dominators, liveness and aliases

pub mod aliases;
pub mod backward;
pub mod cache;
pub mod facts;
pub mod forward;
pub mod guards;
pub mod manager;
pub mod options;
pub mod refine;
pub mod result;
pub mod sink;

pub use backward::{BackwardAnalyzer, BackwardFlowFunctions};
pub use facts::{AnalyzerEvent, BackwardFact, BackwardSummary, ForwardFact, ForwardSummary, Summary};
pub use forward::{ForwardAnalyzer, ForwardFlowFunctions};
pub use manager::TypeInferenceManager;
pub use options::InferenceOptions;
pub use result::{InferenceReport, MethodReport, MethodTypeScheme, TypeInferenceResult};
pub use sink::DiagnosticSink;
