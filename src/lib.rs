//! tsinfer: interprocedural structural type inference over a three-address IR.
//!
//! This crate is the facade over the workspace:
//! - [`ir`]: scene model, access paths, application graph
//! - [`solver`]: the type-fact lattice and its algebra
//! - [`ifds`]: the tabulation runner the analyses are built on
//! - [`infer`]: backward and forward analyses and their orchestration
//!
//! plus the pieces a command-line driver needs: [`config`] for option files
//! and [`tracing_config`] for log output.

pub use tsinfer_common as common;
pub use tsinfer_ifds as ifds;
pub use tsinfer_infer as infer;
pub use tsinfer_ir as ir;
pub use tsinfer_solver as solver;

pub use tsinfer_common::{Diagnostic, DiagnosticCategory};
pub use tsinfer_infer::{
    InferenceOptions, InferenceReport, TypeInferenceManager, TypeInferenceResult,
};
pub use tsinfer_ir::{AccessPathBase, MethodId, Scene};
pub use tsinfer_solver::TypeFact;

pub mod config;
pub mod tracing_config;
