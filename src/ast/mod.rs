//! Abstract Syntax Tree consumed by flow analysis and code generation
//!
//! Trees arrive fully resolved: every expression carries its type, its
//! compile-time constant (if any) and the implicit conversion the binding
//! resolver decided on. Flow analysis writes its verdicts into the per-node
//! annotation structs; code generation only reads them.

mod build;
mod nodes;

pub use build::*;
pub use nodes::*;

/// Source location information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

/// Span of source code (start and end locations)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    pub fn from_to(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start: Location::new(start_line, start_col, 0),
            end: Location::new(end_line, end_col, 0),
        }
    }

    /// Single-line span, mostly for hand-built trees
    pub fn line(line: usize) -> Self {
        Self::from_to(line, 1, line, 1)
    }
}
