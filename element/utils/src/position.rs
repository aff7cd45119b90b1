//! Source positions of Element declarations and expressions.
use crate::Id;

/// A location in an Element source file.
///
/// Spans are plain values computed by the parser, so they can be stored in
/// declarations and diagnostics without a shared position table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Span {
    /// Name of the source the span points into
    pub file: Id,
    /// One-based line number
    pub line: usize,
    /// One-based column number
    pub column: usize,
}

impl Span {
    pub fn new(file: Id, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// An IR node that may contain position information.
pub trait WithPos {
    /// Copy the span associated with this node.
    fn copy_span(&self) -> Option<Span>;
}

impl WithPos for Span {
    fn copy_span(&self) -> Option<Span> {
        Some(*self)
    }
}

impl<T: WithPos> WithPos for Option<T> {
    fn copy_span(&self) -> Option<Span> {
        self.as_ref().and_then(WithPos::copy_span)
    }
}
