//! Dataflow fact domains of the two phases and the summary events they emit.

use std::fmt;
use tsinfer_ifds::Vertex;
use tsinfer_ir::{AccessPath, AccessPathBase, MethodId, StmtRef};
use tsinfer_solver::TypeFact;

/// Backward facts: requirements on the value held by a base.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum BackwardFact {
    Zero,
    TypedVariable { base: AccessPathBase, ty: TypeFact },
}

impl BackwardFact {
    pub fn typed(base: AccessPathBase, ty: TypeFact) -> Self {
        Self::TypedVariable { base, ty }
    }
}

/// Forward facts: observed types of full access paths.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ForwardFact {
    Zero,
    TypedVariable { path: AccessPath, ty: TypeFact },
}

impl ForwardFact {
    pub fn typed(path: AccessPath, ty: TypeFact) -> Self {
        Self::TypedVariable { path, ty }
    }

    pub fn path(&self) -> Option<&AccessPath> {
        match self {
            Self::Zero => None,
            Self::TypedVariable { path, .. } => Some(path),
        }
    }
}

impl fmt::Debug for BackwardFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => f.write_str("Zero"),
            Self::TypedVariable { base, ty } => {
                write!(f, "{base}: {}", ty.to_string_limited())
            }
        }
    }
}

impl fmt::Debug for ForwardFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => f.write_str("Zero"),
            Self::TypedVariable { path, ty } => {
                write!(f, "{path}: {}", ty.to_string_limited())
            }
        }
    }
}

/// A (start fact, exit fact) pair observed for one method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Summary<F> {
    pub method: MethodId,
    pub initial: Vertex<F, StmtRef>,
    pub exit: Vertex<F, StmtRef>,
}

pub type BackwardSummary = Summary<BackwardFact>;
pub type ForwardSummary = Summary<ForwardFact>;

/// Events reported by both analyzers to the manager.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AnalyzerEvent {
    Backward(BackwardSummary),
    Forward(ForwardSummary),
}
