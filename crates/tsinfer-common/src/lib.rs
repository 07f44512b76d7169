//! Common types and utilities for the tsinfer type inference engine.
//!
//! This crate provides foundational items used across all tsinfer crates:
//! - Analysis limits and thresholds (fact sizes, guesser fan-out)
//! - Structured diagnostics (`Diagnostic`, `DiagnosticCategory`, codes)

// Centralized limits and thresholds
pub mod limits;

// Structured diagnostics shared by the solver and the analyses
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, diagnostic_codes};
