//! Error types for the document compiler.
//!
//! Only [`Error`] ever reaches the caller of a compile. Directive problems
//! are reported as [`ValidationError`] values and rendered into the
//! document as diagnostics.

pub use lectern_core::{Error, Result};

/// A document that cannot be parsed at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// Line number (1-indexed)
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A problem with a single embed directive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// An attribute is missing, malformed or out of bounds.
    #[error("{0}")]
    Attribute(String),

    /// The referenced file could not be read.
    #[error("unable to read \"{file}\": {reason}")]
    FileAccess { file: String, reason: String },
}
