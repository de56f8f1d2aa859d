//! Abstract syntax tree for the Java subset the compiler accepts.
//!
//! Type declarations live in a [`DeclArena`] and refer to their enclosing and
//! nested declarations by [`DeclId`]. Statements and expressions are closed
//! enums; every expression carries a unit-unique [`ExprId`] that later passes
//! use as the key of their side tables.

mod nodes;

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

    /// Smallest span covering both.
    pub fn to(self, other: Span) -> Span {
        let start = if other.start.offset < self.start.offset { other.start } else { self.start };
        let end = if other.end.offset > self.end.offset { other.end } else { self.end };
        Span { start, end }
    }

    pub fn line(&self) -> usize {
        self.start.line
    }
}
