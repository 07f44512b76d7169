use thiserror::Error;

/// Phase-level failures. Any of these aborts the running phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The control flow graph violates an invariant the analysis relies on.
    #[error("malformed CFG at {location}: {message}")]
    MalformedCfg { location: String, message: String },

    /// A construct the analysis refuses to model.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Summary subscriptions across analysis units were requested.
    #[error("cross-unit summary subscription requested for {0}")]
    CrossUnitSubscription(String),

    /// The runner task stopped without completing its phase.
    #[error("runner failed: {0}")]
    RunnerFailed(String),
}

impl AnalysisError {
    pub fn malformed_cfg(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedCfg {
            location: location.into(),
            message: message.into(),
        }
    }
}
