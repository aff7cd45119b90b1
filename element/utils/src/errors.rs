//! Errors generated by the compiler.
//!
//! These are failures of the host environment or of the compiler itself.
//! Mistakes in Element programs are reported as diagnostics instead and never
//! flow through this type.
use crate::{Span, WithPos};
use thiserror::Error as ThisError;

/// Convenience wrapper to represent success or meaningful compiler error.
pub type ElementResult<T> = std::result::Result<T, Error>;

/// Errors generated by the compiler
pub struct Error {
    kind: Box<ErrorKind>,
    pos: Option<Span>,
    post_msg: Option<String>,
}

#[derive(ThisError, Debug)]
enum ErrorKind {
    /// The input file is invalid (does not exist or cannot be read).
    #[error("Invalid file: {0}")]
    InvalidFile(String),
    /// The source text does not follow the grammar.
    #[error("Failed to parse: {0}")]
    Parse(String),
    /// The compiler itself is misconfigured or has a bug.
    #[error("Internal compiler error: {0}")]
    Internal(String),
    /// An expression graph was constructed with invalid shape.
    #[error("Malformed graph: {0}")]
    MalformedGraph(String),
    /// Failed to write the output.
    #[error("Write error: {0}")]
    WriteError(String),
    /// Miscellaneous error message
    #[error("{0}")]
    Misc(String),
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            pos: None,
            post_msg: None,
        }
    }

    pub fn with_pos<T: WithPos>(mut self, pos: &T) -> Self {
        self.pos = pos.copy_span();
        self
    }

    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidFile(msg.to_string()))
    }
    pub fn parse<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Parse(msg.to_string()))
    }
    pub fn internal<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Internal(msg.to_string()))
    }
    pub fn malformed_graph<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedGraph(msg.to_string()))
    }
    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::WriteError(msg.to_string()))
    }
    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    /// Whether this error signals a bug or misconfiguration of the compiler.
    pub fn is_internal(&self) -> bool {
        matches!(*self.kind, ErrorKind::Internal(_))
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn location(&self) -> Option<Span> {
        self.pos
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(pos) = &self.pos {
            write!(f, "{pos}: ")?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

// Conversions from other error types to our error type so that
// we can use `?` in all the places.
impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::invalid_file(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {err}"))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::write_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::{Id, Span};

    #[test]
    fn display_includes_position_and_post_message() {
        let span = Span::new(Id::new("main.ele"), 3, 7);
        let err = Error::parse("expected `;`")
            .with_pos(&span)
            .with_post_msg(Some("while reading main.ele".to_string()));
        assert_eq!(
            err.to_string(),
            "main.ele:3:7: Failed to parse: expected `;`\nwhile reading main.ele"
        );
        assert_eq!(err.location(), Some(span));
    }

    #[test]
    fn internal_errors_are_flagged() {
        assert!(Error::internal("unknown message code").is_internal());
        assert!(!Error::misc("oops").is_internal());
    }
}
