//! Index Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Failures of the storage and compression crates are
//! raised into these kinds with `or_raise`, so the original error stays in
//! the tree underneath.

use derive_more::{Display, Error};

/// An index engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Request Errors
/// - [`ErrorKind::Configuration`]
/// - [`ErrorKind::UnknownRepository`]
/// - [`ErrorKind::Format`]
/// - [`ErrorKind::AlreadyExists`]
///
/// ### Catalog Errors
/// - [`ErrorKind::IndexNotFound`]
/// - [`ErrorKind::CollisionResolution`]
/// - [`ErrorKind::CorruptDocument`]
///
/// ### Operational Errors
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Conflict`]
/// - [`ErrorKind::Timeout`]
/// - [`ErrorKind::Cleanup`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Repository settings are missing a value or make the request
    /// impossible to place.
    #[display("configuration error: {_0}")]
    Configuration(#[error(not(source))] String),
    /// No configuration exists for the `project/repo` pair.
    #[display("unknown repository: {_0}")]
    UnknownRepository(#[error(not(source))] String),
    /// The upload could not be interpreted: unsupported extension, invalid
    /// path or a package the parser rejected. Nothing was written.
    #[display("unsupported artifact: {_0}")]
    Format(#[error(not(source))] String),
    /// Different bytes are stored at the path and the upload asked not to
    /// overwrite them. Nothing was written.
    #[display("artifact already exists: {_0}")]
    AlreadyExists(#[error(not(source))] String),
    /// A catalog record expected for removal does not exist. Nothing was
    /// written.
    #[display("index record not found: {_0}")]
    IndexNotFound(#[error(not(source))] String),
    /// An upload replacing an existing artifact found no record to replace.
    #[display("no catalog record to replace at {_0}")]
    CollisionResolution(#[error(not(source))] String),
    /// A stored catalog document failed to decompress or parse.
    #[display("corrupt catalog document: {_0}")]
    CorruptDocument(#[error(not(source))] String),
    /// The content or node store failed.
    #[display("storage error")]
    Storage,
    /// Concurrent writers kept winning the race for the index root.
    #[display("index root stayed contended: {_0}")]
    Conflict(#[error(not(source))] String),
    /// The operation ran out of time.
    #[display("operation timed out")]
    Timeout,
    /// Deleting a superseded node failed. Only ever logged.
    #[display("surplus node cleanup failed: {_0}")]
    Cleanup(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Conflict(_) | Self::Timeout)
    }
}

pub(crate) fn corrupt(err: impl std::fmt::Display) -> ErrorKind {
    ErrorKind::CorruptDocument(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Storage, true)]
    #[case(ErrorKind::Timeout, true)]
    #[case(ErrorKind::Conflict("p/r".into()), true)]
    #[case(ErrorKind::IndexNotFound("x.rpm".into()), false)]
    #[case(ErrorKind::Format("x.deb".into()), false)]
    #[case(ErrorKind::AlreadyExists("a/p.rpm".into()), false)]
    fn test_is_retryable(#[case] kind: ErrorKind, #[case] retryable: bool) {
        assert_eq!(kind.is_retryable(), retryable);
    }
}
