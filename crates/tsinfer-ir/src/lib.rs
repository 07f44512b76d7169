//! Program model consumed by the tsinfer analyses.
//!
//! - [`model`]: statements, values, signatures and declared types
//! - [`scene`]: classes and methods with their control flow graphs
//! - [`access_path`]: symbolic locations used as dataflow fact keys
//! - [`graph`]: the interprocedural [`EtsApplicationGraph`] and [`Reversed`]
//! - [`dominators`], [`liveness`]: per-method CFG analyses

pub mod access_path;
pub mod builder;
pub mod dominators;
pub mod error;
pub mod graph;
pub mod liveness;
pub mod model;
pub mod scene;

pub use access_path::{AccessPath, AccessPathBase, Accessor, NotAnAccessPath, to_path};
pub use builder::{ClassBuilder, MethodBuilder, SceneBuilder};
pub use dominators::Dominators;
pub use error::IrError;
pub use graph::{EtsApplicationGraph, Reversed};
pub use liveness::{AlwaysAlive, LiveVariables, MethodLiveness};
pub use model::{
    BinaryOp, ClassSignature, Constant, EtsType, FieldSignature, Local, MethodSignature, Name,
    Stmt, UnaryOp, Value,
};
pub use scene::{Class, ClassId, Method, MethodId, Scene, SceneDecl, StmtRef};
