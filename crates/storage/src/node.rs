//! Node models.

use std::collections::BTreeMap;
use time::UtcDateTime;

/// Metadata record for one path in a [`NodeStore`](crate::NodeStore).
///
/// Nodes never carry bytes themselves; `content_hash` names the blob in the
/// [`ContentStore`](crate::ContentStore). Metadata-only nodes (such as index
/// heads) have an empty hash and zero size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Normalised path from the store root
    pub full_path: String,
    /// SHA-256 of the node's content
    pub content_hash: String,
    /// Content size in bytes
    pub size: u64,
    pub metadata: BTreeMap<String, String>,
    /// When this revision of the node was written
    pub created_at: UtcDateTime,
    /// Starts at 1 and increases by one every time the path is overwritten.
    pub revision: u64,
}
impl Node {
    /// Final segment of the node's path.
    pub fn name(&self) -> &str {
        crate::path::file_name(&self.full_path)
    }

    /// Path of the directory containing this node.
    pub fn parent(&self) -> &str {
        crate::path::parent(&self.full_path)
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Write precondition for [`NodeStore::create`](crate::NodeStore::create).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Expect {
    /// Create or overwrite unconditionally.
    #[default]
    Any,
    /// Only create; fail if any node exists at the path.
    Absent,
    /// Only overwrite the node currently at this revision.
    Revision(u64),
}
impl Expect {
    /// Check the precondition against the node currently stored at the path.
    pub fn holds(&self, current: Option<&Node>) -> bool {
        match (self, current) {
            (Expect::Any, _) => true,
            (Expect::Absent, None) => true,
            (Expect::Revision(expected), Some(node)) => node.revision == *expected,
            _ => false,
        }
    }
}

/// Request to create (or overwrite) a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub full_path: String,
    pub content_hash: String,
    pub size: u64,
    pub metadata: BTreeMap<String, String>,
    pub expect: Expect,
}
impl NewNode {
    pub fn new(full_path: impl Into<String>, content_hash: impl Into<String>, size: u64) -> Self {
        Self {
            full_path: full_path.into(),
            content_hash: content_hash.into(),
            size,
            metadata: BTreeMap::new(),
            expect: Expect::Any,
        }
    }

    /// A node without content, used for pointers and counters.
    pub fn metadata_only(full_path: impl Into<String>) -> Self {
        Self::new(full_path, "", 0)
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn expecting(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    /// Materialise the request as the node a store would hold after writing it.
    pub fn into_node(self, created_at: UtcDateTime, revision: u64) -> Node {
        Node {
            full_path: self.full_path,
            content_hash: self.content_hash,
            size: self.size,
            metadata: self.metadata,
            created_at,
            revision,
        }
    }
}
