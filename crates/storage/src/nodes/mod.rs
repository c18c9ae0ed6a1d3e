//! Node store trait and implementations.
//!
//! A node store is the path-indexed catalog of everything in a repository:
//! uploaded artifacts, catalog documents, manifests and index heads. Writes
//! take an [`Expect`](crate::Expect) precondition so that callers can build
//! optimistic concurrency on top of a plain CRUD interface.

#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockNodeStore, Operation};
use crate::error::Result;
use crate::node::{Expect, NewNode, Node};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub type NodeStream<'a> = Pin<Box<dyn Stream<Item = Result<Node>> + Send + 'a>>;

/// Path-indexed metadata catalog.
///
/// # Path Handling
/// All paths are relative to the store root and are normalised with
/// [`validate_path`](crate::validate_path) by implementations before use.
///
/// # Examples
///
/// ```
/// use repomd_storage::{Expect, NewNode, NodeStore, error::Result};
///
/// async fn bump(store: &dyn NodeStore, path: &str) -> Result<u64> {
///     let expect = match store.get(path).await? {
///         Some(node) => Expect::Revision(node.revision),
///         None => Expect::Absent,
///     };
///     let node = store.create(NewNode::metadata_only(path).expecting(expect)).await?;
///     Ok(node.revision)
/// }
/// ```
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Name of the store, used for logging only.
    fn name(&self) -> &str;

    /// Fetch the node at `path`, if there is one.
    async fn get(&self, path: &str) -> Result<Option<Node>>;

    /// Stream the nodes below `prefix`.
    ///
    /// With `recursive == false` only direct children of `prefix` are
    /// returned. An empty prefix addresses the store root. Order is
    /// unspecified.
    fn list_stream<'a>(&'a self, prefix: &'a str, recursive: bool) -> NodeStream<'a>;

    /// Collect [`list_stream()`](Self::list_stream) into a [`Vec`].
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<Node>> {
        self.list_stream(prefix, recursive).try_collect().await
    }

    /// Create or overwrite a node, returning what was stored.
    ///
    /// Returns [`Conflict`](crate::error::ErrorKind::Conflict) when the
    /// request's [`Expect`](crate::Expect) precondition does not hold. The
    /// check and the write are atomic.
    async fn create(&self, node: NewNode) -> Result<Node>;

    /// Delete the node at `path`.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if there is no
    /// such node.
    async fn delete(&self, path: &str) -> Result<()> {
        self.delete_expecting(path, Expect::Any).await
    }

    /// Delete the node at `path` only if `expect` holds for it.
    ///
    /// [`Expect::Revision`] guards against removing a node that was
    /// rewritten since it was last read. A failed precondition is a
    /// [`Conflict`](crate::error::ErrorKind::Conflict); a missing node is
    /// [`NotFound`](crate::error::ErrorKind::NotFound) whatever `expect` says.
    async fn delete_expecting(&self, path: &str, expect: Expect) -> Result<()>;
}

/// Normalise a listing prefix, allowing the empty root prefix.
pub(crate) fn normalise_prefix(prefix: &str) -> Result<String> {
    match prefix.trim_matches('/').is_empty() {
        true => Ok(String::new()),
        false => crate::path::validate(prefix),
    }
}

/// Whether `path` is listed under `prefix` for the given recursion mode.
pub(crate) fn is_listed(path: &str, prefix: &str, recursive: bool) -> bool {
    match recursive {
        false => crate::path::parent(path) == prefix,
        true if prefix.is_empty() => true,
        true => path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_listed_direct_children() {
        assert!(is_listed("a/b/repodata/repomd.xml", "a/b/repodata", false));
        assert!(!is_listed("a/b/repodata/x/y.xml", "a/b/repodata", false));
        assert!(!is_listed("a/b/repodata2/y.xml", "a/b/repodata", false));
        assert!(is_listed("top.rpm", "", false));
    }

    #[test]
    fn test_is_listed_recursive() {
        assert!(is_listed("a/b/repodata/x/y.xml", "a/b", true));
        assert!(!is_listed("a/bc/y.xml", "a/b", true));
        assert!(!is_listed("a/b", "a/b", true));
        assert!(is_listed("anything/at/all", "", true));
    }

    #[test]
    fn test_normalise_prefix() {
        assert_eq!(normalise_prefix("").unwrap(), "");
        assert_eq!(normalise_prefix("/").unwrap(), "");
        assert_eq!(normalise_prefix("/a/b/").unwrap(), "a/b");
        assert!(normalise_prefix("../x").is_err());
    }
}
