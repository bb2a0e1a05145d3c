//! Error types for encoding and decoding.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding stored bytes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stored buffer has the wrong length for the requested type.
    #[error("unexpected length: expected {expected} bytes, got {actual}")]
    UnexpectedLength {
        /// Number of bytes the type requires.
        expected: usize,
        /// Number of bytes actually present.
        actual: usize,
    },

    /// The stored buffer is not valid UTF-8.
    #[error("stored bytes are not valid UTF-8")]
    InvalidUtf8,

    /// The stored buffer could not be interpreted as the requested type.
    #[error("malformed value: {0}")]
    Malformed(String),
}

impl CodecError {
    /// Creates an unexpected-length error.
    #[must_use]
    pub fn unexpected_length(expected: usize, actual: usize) -> Self {
        Self::UnexpectedLength { expected, actual }
    }

    /// Creates a malformed-value error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
