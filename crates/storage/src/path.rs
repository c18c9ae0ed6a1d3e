//! Repository path validation.
//!
//! Node paths are slash-separated and relative to the store root. They are
//! normalised before use so that `a//b/./c/` and `a/b/c` address the same
//! node, and rejected if they try to climb out of the root.

use crate::error::{ErrorKind, Result};

/// Validates and normalises a repository path.
///
/// Leading, trailing and repeated slashes are dropped, `.` segments removed
/// and `..` segments resolved. Paths that would leave the root, contain a NUL
/// byte or a backslash, or normalise to nothing are rejected with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use repomd_storage::validate_path;
/// assert_eq!(validate_path("/centos/7/os/x86_64/p-1.0-1.rpm").unwrap(), "centos/7/os/x86_64/p-1.0-1.rpm");
/// assert_eq!(validate_path("a/../b//c/").unwrap(), "b/c");
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// ```
pub fn validate(path: impl AsRef<str>) -> Result<String> {
    let raw = path.as_ref();
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
                }
            },
            // Backslashes would be separators to a Windows-backed store.
            s if s.contains('\0') || s.contains('\\') => exn::bail!(ErrorKind::InvalidPath(raw.to_string())),
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(raw.to_string())),
        false => Ok(segments.join("/")),
    }
}

/// Join a (possibly empty) base path and a relative path.
#[must_use]
pub fn join(base: &str, rest: &str) -> String {
    match (base.trim_matches('/'), rest.trim_matches('/')) {
        ("", rest) => rest.to_string(),
        (base, "") => base.to_string(),
        (base, rest) => format!("{base}/{rest}"),
    }
}

/// Final segment of a normalised path.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Everything before the final segment of a normalised path (empty for
/// top-level paths).
#[must_use]
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}
