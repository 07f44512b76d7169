use thiserror::Error;

/// Failures while building a [`Scene`](crate::Scene) from its declaration.
#[derive(Debug, Error)]
pub enum IrError {
    #[error("failed to parse scene: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{method}: statement {index} has successor {target} out of range")]
    InvalidSuccessor {
        method: String,
        index: usize,
        target: u32,
    },

    #[error("{method}: {successors} successor lists for {stmts} statements")]
    SuccessorCountMismatch {
        method: String,
        stmts: usize,
        successors: usize,
    },

    #[error("{method}: branch at statement {index} needs explicit successors")]
    MissingBranchTargets { method: String, index: usize },
}
