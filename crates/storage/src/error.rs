//! Storage Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Node or content does not exist
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// A write precondition ([`Expect`](crate::Expect)) did not hold; re-read
    /// and try again.
    #[display("write conflict: {_0}")]
    Conflict(#[error(not(source))] String),
    /// Path contains invalid characters or escapes the repository root
    #[display("invalid path: {_0:?}")]
    InvalidPath(#[error(not(source))] String),
    /// Content key is not a lowercase hex SHA-256 digest
    #[display("invalid content hash: {_0:?}")]
    InvalidHash(#[error(not(source))] String),
    /// Stored bytes do not hash to the key they were stored under
    #[display("content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The store could not be reached or refused the request.
    #[display("store unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Unavailable(_) | Self::Conflict(_))
    }
}
