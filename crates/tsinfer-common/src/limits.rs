//! Centralized limits and thresholds for the type inference engine.
//!
//! The dataflow lattice of structural type facts is infinite: objects can nest
//! arbitrarily and access paths can grow without bound through loops such as
//! `x = x.next`. These constants keep the per-method fact set finite.
//!
//! # Categories
//!
//! - **Fact size limits**: drop facts whose access path or type grows too large
//! - **Guessing limits**: bound the fan-out of nominal type resolution
//! - **Rendering limits**: keep log lines readable

// =============================================================================
// Fact Size Limits
// =============================================================================

/// Maximum number of accessors in a forward access path.
///
/// Forward facts longer than this are dropped after each sequent step.
///
/// # Example
///
/// ```typescript
/// // A loop walking a linked list keeps appending `.next`:
/// let n = head;
/// while (n) { n = n.next; }
/// // head.next.next.next.next.next.next -> dropped
/// ```
pub const MAX_ACCESS_PATH_LENGTH: usize = 5;

/// Maximum number of times a single field name may repeat in one access path.
///
/// Catches self-referential walks (`a.next.next.next.next`) before they reach
/// [`MAX_ACCESS_PATH_LENGTH`].
pub const MAX_DUPLICATE_FIELDS: usize = 3;

/// Nesting complexity at which backward facts are dropped.
///
/// Backward analysis wraps the required type into a fresh `Object`/`Array`
/// level on every field or element read. A fact whose type reaches this
/// complexity is discarded with a `FACT_LIMIT_EXCEEDED` diagnostic.
pub const MAX_BACKWARD_TYPE_COMPLEXITY: usize = 5;

// =============================================================================
// Guessing Limits
// =============================================================================

/// Maximum number of candidate classes the type guesser turns into a union.
///
/// With more candidates the structural fact is returned unresolved.
pub const MAX_GUESSED_CANDIDATES: usize = 5;

// =============================================================================
// Rendering Limits
// =============================================================================

/// Maximum length of a rendered type fact inside a log line or diagnostic.
pub const DISPLAY_TRUNCATION: usize = 300;
