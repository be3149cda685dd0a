//! Centralized error types for replydraft.

use std::path::PathBuf;
use thiserror::Error;

use crate::generation::GenerationError;

/// All errors produced by the replydraft library.
#[derive(Error, Debug)]
pub enum DraftError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The vector index file is corrupt or was built with an incompatible version.
    #[error("Corrupt or incompatible vector index '{path}': {reason}")]
    InvalidIndex { path: PathBuf, reason: String },

    /// A vector does not have the dimension the index or provider expects.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The historical corpus file could not be parsed.
    #[error("Invalid corpus file '{path}': {reason}")]
    InvalidCorpus { path: PathBuf, reason: String },

    /// The embedding backend failed or returned something unusable.
    #[error("Embedding backend error: {0}")]
    Embedding(String),

    /// Generating a reply failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A mail store call failed.
    #[error("Mail store error: {0}")]
    MailStore(String),

    /// The mail store is not reachable at all.
    #[error("Mail store unavailable at '{0}'")]
    CollaboratorUnavailable(PathBuf),

    /// The message id does not refer to a message in the store.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Convenience alias for `Result<T, DraftError>`.
pub type Result<T> = std::result::Result<T, DraftError>;

impl DraftError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `DraftError::io`).
impl From<std::io::Error> for DraftError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
