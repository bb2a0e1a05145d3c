//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage layer.
///
/// Absence of a key is never an error; reads return `Ok(None)` for missing
/// or undecodable entries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The native engine could not be created or opened.
    #[error("failed to open store: {0}")]
    Open(String),

    /// A commit failed at the native layer.
    ///
    /// Never retried internally. A failed commit indicates an unrecoverable
    /// local-storage condition; callers that depend on storage integrity
    /// should treat this as fatal.
    #[error("fatal store write failure: {0}")]
    Write(String),

    /// A native read operation failed (distinct from a key being absent).
    #[error("store read failure: {0}")]
    Read(String),

    /// An I/O error occurred while manipulating the store directory.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Key or value encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] strata_codec::CodecError),

    /// Invalid construction parameters.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Creates an open failure.
    pub fn open(message: impl Into<String>) -> Self {
        Self::Open(message.into())
    }

    /// Creates a write failure.
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write(message.into())
    }

    /// Creates a read failure.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
