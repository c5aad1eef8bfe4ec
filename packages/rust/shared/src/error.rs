//! Error types for lessongen.
//!
//! Library crates use [`LessonGenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all lessongen operations.
#[derive(Debug, thiserror::Error)]
pub enum LessonGenError {
    /// Configuration loading or validation error (missing credentials, bad URL).
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure or non-success HTTP status from the store or generator.
    #[error("network error: {0}")]
    Network(String),

    /// Generator output could not be parsed as lesson JSON.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Record store rejected or could not satisfy a request.
    #[error("storage error: {0}")]
    Storage(String),

    /// Completion service answered without usable content.
    #[error("generation error: {0}")]
    Generation(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unexpected shape, lookup miss, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LessonGenError>;

impl LessonGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
