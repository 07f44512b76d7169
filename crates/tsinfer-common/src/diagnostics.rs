//! Structured diagnostics for the inference engine.
//!
//! Algebra functions never log. Contradictions, unsupported constructs and
//! dropped facts are reported as `Diagnostic` records that the orchestrator
//! collects and hands back to the caller. Every record is mirrored to
//! `tracing` when it is reported, so a run with `TSINFER_LOG=warn` shows the
//! same information.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Message,
}

pub mod diagnostic_codes {
    /// Two type requirements intersect to bottom; the prior operand was kept.
    pub const EMPTY_INTERSECTION: u32 = 1001;
    /// A construct the analysis does not model yet; the fact was dropped or passed through.
    pub const UNSUPPORTED_CONSTRUCT: u32 = 1002;
    /// A guard was re-applied with the opposite polarity.
    pub const GUARD_POLARITY_CONFLICT: u32 = 1003;
    /// A call site has no resolvable callee.
    pub const UNRESOLVED_CALL: u32 = 1004;
    /// A fact exceeded a size limit and was dropped.
    pub const FACT_LIMIT_EXCEEDED: u32 = 1005;
    /// A phase did not finish before its deadline.
    pub const PHASE_TIMEOUT: u32 = 1006;
}

/// Message templates, indexed by code. `{0}`, `{1}` are positional arguments.
const MESSAGE_TEMPLATES: &[(u32, &str)] = &[
    (diagnostic_codes::EMPTY_INTERSECTION, "Empty intersection type: {0} & {1}"),
    (diagnostic_codes::UNSUPPORTED_CONSTRUCT, "Unsupported construct: {0}"),
    (diagnostic_codes::GUARD_POLARITY_CONFLICT, "Same guard with different sign: {0} on {1}"),
    (diagnostic_codes::UNRESOLVED_CALL, "No callee resolved for call: {0}"),
    (diagnostic_codes::FACT_LIMIT_EXCEEDED, "Dropping too complex fact: {0}"),
    (diagnostic_codes::PHASE_TIMEOUT, "Phase '{0}' did not finish in {1} ms"),
];

pub fn get_message_template(code: u32) -> Option<&'static str> {
    MESSAGE_TEMPLATES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, template)| *template)
}

pub fn format_message(message: &str, args: &[&str]) -> String {
    let mut result = message.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    /// What the diagnostic is about: a method, a class or a statement.
    pub subject: String,
    pub message_text: String,
}

impl Diagnostic {
    /// Build a diagnostic from its code template.
    pub fn from_code(
        category: DiagnosticCategory,
        code: u32,
        subject: impl Into<String>,
        args: &[&str],
    ) -> Self {
        let message_text = match get_message_template(code) {
            Some(template) => format_message(template, args),
            None => args.join(", "),
        };
        Self {
            category,
            code,
            subject: subject.into(),
            message_text,
        }
    }

    pub fn warning(code: u32, subject: impl Into<String>, args: &[&str]) -> Self {
        Self::from_code(DiagnosticCategory::Warning, code, subject, args)
    }

    pub fn error(code: u32, subject: impl Into<String>, args: &[&str]) -> Self {
        Self::from_code(DiagnosticCategory::Error, code, subject, args)
    }

    /// Mirror this diagnostic to the `tracing` subscriber.
    pub fn emit_trace(&self) {
        match self.category {
            DiagnosticCategory::Error => {
                tracing::error!(code = self.code, subject = %self.subject, "{}", self.message_text);
            }
            DiagnosticCategory::Warning => {
                tracing::warn!(code = self.code, subject = %self.subject, "{}", self.message_text);
            }
            DiagnosticCategory::Message => {
                tracing::debug!(code = self.code, subject = %self.subject, "{}", self.message_text);
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = match self.category {
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Message => "message",
        };
        write!(
            f,
            "{category} TI{}: {} [{}]",
            self.code, self.message_text, self.subject
        )
    }
}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod tests;
