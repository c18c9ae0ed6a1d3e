//! Storage collaborators of the repository metadata index engine.
//!
//! Two stores back every repository:
//!
//! - a [`ContentStore`] holding immutable bytes keyed by their SHA-256
//!   digest, and
//! - a [`NodeStore`] mapping slash-separated repository paths to [`Node`]s
//!   (the digest of their content plus a string metadata map).
//!
//! Both are external services in a real deployment. This crate defines their
//! interfaces, a filesystem-backed [`LocalContentStore`](content::LocalContentStore),
//! and (behind the `mock` feature) in-memory implementations for tests.

pub mod content;
pub mod error;
mod node;
pub mod nodes;
mod path;

pub use crate::content::ContentStore;
pub use crate::node::{Expect, NewNode, Node};
pub use crate::nodes::NodeStore;
pub use crate::path::{file_name, join as join_path, parent as parent_path, validate as validate_path};
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub type ContentHandle = Arc<dyn ContentStore>;
pub type NodeHandle = Arc<dyn NodeStore>;

/// Lowercase hex SHA-256 digest of `data`, the key format of every
/// [`ContentStore`].
///
/// ```
/// assert_eq!(
///     repomd_storage::sha256_hex(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// );
/// ```
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
