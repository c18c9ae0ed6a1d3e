//! Duplicate detection for incoming uploads.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use repomd_storage::{Node, NodeStore};

/// How an upload relates to whatever is already stored at its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Nothing is stored at the path.
    New,
    /// The same bytes are already stored at the path.
    ExactDuplicate(Node),
    /// Different bytes are stored at the path and will be replaced.
    PathCollision(Node),
}

impl Classification {
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::PathCollision(_))
    }
}

/// Classify an upload of `content_hash` to the node path `full_path`.
#[tracing::instrument(level = "debug", skip(nodes))]
pub async fn classify(nodes: &dyn NodeStore, full_path: &str, content_hash: &str) -> Result<Classification> {
    let existing = nodes.get(full_path).await.or_raise(|| ErrorKind::Storage)?;
    Ok(match existing {
        None => Classification::New,
        Some(node) if node.content_hash == content_hash => Classification::ExactDuplicate(node),
        Some(node) => Classification::PathCollision(node),
    })
}
