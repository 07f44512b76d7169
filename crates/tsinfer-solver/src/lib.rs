//! Type facts and their algebra.
//!
//! - [`type_fact`]: the [`TypeFact`] lattice, normalization and rendering
//! - [`processor`]: union and intersection, optionally scene-aware
//! - [`guesser`]: resolution of anonymous object shapes to declared classes

pub mod guesser;
pub mod processor;
pub mod type_fact;

pub use guesser::TypeGuesser;
pub use processor::TypeFactProcessor;
pub use type_fact::{
    FactSet, GuardConflict, GuardedFact, ObjectFact, Properties, STRING_PROPERTIES, TypeFact,
    is_string_property,
};
