//! Error types for oxicache operations.

use std::io;

/// Result type alias using [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors returned by cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// I/O error from the underlying filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// An argument failed validation (malformed key, non-positive limits).
    #[error("{0}")]
    InvalidArgument(String),

    /// An operation was attempted in a state that does not allow it
    /// (closed cache, finished editor, editor/entry mismatch).
    #[error("{0}")]
    InvalidState(String),

    /// The underlying stream ended. Distinct from [`CacheError::Io`] so
    /// journal replay can tell a clean end from a read failure.
    #[error("end of stream")]
    EndOfStream,

    /// The journal on disk does not match the expected format.
    #[error("corrupt journal: {0}")]
    Corrupt(String),
}

impl CacheError {
    /// Shorthand for an [`CacheError::InvalidArgument`] error.
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        CacheError::InvalidArgument(message.into())
    }

    /// Shorthand for an [`CacheError::InvalidState`] error.
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        CacheError::InvalidState(message.into())
    }

    /// Shorthand for a [`CacheError::Corrupt`] error.
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        CacheError::Corrupt(message.into())
    }

    /// Check whether this error is the distinct end-of-stream condition.
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, CacheError::EndOfStream)
    }
}
