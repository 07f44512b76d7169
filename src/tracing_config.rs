//! Log output for the `tsinfer` binary and for embedders that want the same
//! setup.
//!
//! Nothing is installed unless `TSINFER_LOG` (or `RUST_LOG`) is set. The
//! filter uses the usual directive syntax; `TSINFER_LOG_FORMAT` picks the
//! rendering:
//!
//! - `text` (default): one line per event
//! - `tree`: events nested under the `backward` / `forward` / `refine` phase
//!   spans, via `tracing-tree`
//! - `json`: newline-delimited JSON
//!
//! ```bash
//! TSINFER_LOG=info tsinfer scene.json
//! TSINFER_LOG="tsinfer_infer=debug,tsinfer_ifds=trace" TSINFER_LOG_FORMAT=tree tsinfer scene.json
//! ```
//!
//! Output always goes to stderr; stdout carries the inference report.

use std::str::FromStr;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

pub const LOG_ENV: &str = "TSINFER_LOG";
pub const LOG_FORMAT_ENV: &str = "TSINFER_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Tree,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(Self::Text),
            "tree" => Ok(Self::Tree),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

impl LogFormat {
    /// Format named by `TSINFER_LOG_FORMAT`; unknown names fall back to text.
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }
}

/// `TSINFER_LOG` wins over `RUST_LOG`. `None` when neither is set.
fn env_filter() -> Option<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(directives) => Some(EnvFilter::builder().parse_lossy(directives)),
        Err(_) if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() => {
            Some(EnvFilter::from_default_env())
        }
        Err(_) => None,
    }
}

/// Install the global subscriber if logging was requested.
///
/// Calling this more than once keeps the first subscriber.
pub fn init_tracing() {
    let Some(filter) = env_filter() else {
        return;
    };

    let installed = match LogFormat::from_env() {
        LogFormat::Tree => {
            let layer = tracing_tree::HierarchicalLayer::new(2)
                .with_writer(std::io::stderr)
                .with_indent_lines(true)
                .with_targets(true)
                .with_deferred_spans(true);
            Registry::default().with(filter).with(layer).try_init()
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr);
            Registry::default().with(filter).with(layer).try_init()
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
            Registry::default().with(filter).with(layer).try_init()
        }
    };
    if installed.is_err() {
        tracing::debug!("a global subscriber is already installed");
    }
}
