//! Common definitions shared across the analysis and emission passes
//!
//! This module contains the internal error type, the diagnostics sink and the
//! resolved type handles consumed from the binding resolver.

pub mod error;
pub mod problem;
pub mod types;

// Re-export commonly used items for convenience
pub use error::{AbortScope, Error, Result};
pub use problem::{Problem, ProblemCollector, ProblemKind, ProblemReporter, Severity};
pub use types::{ClassHierarchy, ClassTable, Type, TypeCode};
