//! Error types for lectern-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for lectern-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lectern-core.
///
/// Errors carry messages rather than the underlying `io::Error` so that a
/// single failed computation can be handed to every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Failed to read a source file.
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Failed to parse a document.
    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Cache storage could not be read or written.
    #[error("cache I/O error at {path}: {message}")]
    CacheIo { path: PathBuf, message: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A background task failed before producing a result.
    #[error("task failed: {0}")]
    Task(String),
}

impl Error {
    /// Build a [`Error::Read`] from an I/O error.
    pub fn read(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Error::Read {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Build a [`Error::CacheIo`] from an I/O error.
    pub fn cache_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Error::CacheIo {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_display() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::read("/lessons/01.mdx", &io);
        let msg = err.to_string();
        assert!(msg.contains("failed to read"));
        assert!(msg.contains("01.mdx"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = Error::Parse {
            path: PathBuf::from("lesson.mdx"),
            message: "unterminated code fence".to_string(),
        };
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
