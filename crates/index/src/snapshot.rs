//! Point-in-time view of an index root's `repodata` directory.

use crate::cleaner::SurplusNode;
use crate::error::{ErrorKind, Result};
use crate::models::{CatalogNode, DocumentKind, GroupNode, GroupVariant, IndexNode, IndexRoot};
use exn::ResultExt;
use repomd_storage::{Node, NodeStore};

#[derive(Debug, Clone, Default)]
pub(crate) struct RepodataSnapshot {
    pub head: Option<Node>,
    pub manifest: Option<Node>,
    pub catalogs: Vec<CatalogNode>,
    pub groups: Vec<GroupNode>,
}

impl RepodataSnapshot {
    #[tracing::instrument(level = "debug", skip(nodes), fields(root = %root))]
    pub async fn load(nodes: &dyn NodeStore, root: &IndexRoot) -> Result<Self> {
        let (head_path, manifest_path) = (root.head_path(), root.manifest_path());
        let mut snapshot = Self::default();
        for node in nodes.list(&root.repodata(), false).await.or_raise(|| ErrorKind::Storage)? {
            if node.full_path == head_path {
                snapshot.head = Some(node);
            } else if node.full_path == manifest_path {
                snapshot.manifest = Some(node);
            } else if IndexNode::is_tagged(&node) {
                match IndexNode::try_from(&node) {
                    Ok(IndexNode::Catalog(catalog)) => snapshot.catalogs.push(catalog),
                    Ok(IndexNode::Group(group)) => snapshot.groups.push(group),
                    Err(e) => tracing::warn!(path = %node.full_path, error = ?e, "ignoring unreadable index node"),
                }
            }
        }
        Ok(snapshot)
    }

    /// Revision of the index head; zero before the first commit.
    pub fn generation(&self) -> u64 {
        self.head.as_ref().map_or(0, |head| head.revision)
    }

    fn head_reference(&self, kind: DocumentKind) -> Option<&str> {
        self.head.as_ref()?.meta(kind.as_str())
    }

    /// The document of `kind` readers should see.
    ///
    /// That is the one the head points at, as long as it still exists.
    /// Otherwise the most recently created document of the kind wins.
    pub fn canonical(&self, kind: DocumentKind) -> Option<&CatalogNode> {
        let candidates = self.catalogs.iter().filter(|catalog| catalog.kind == kind);
        if let Some(path) = self.head_reference(kind)
            && let Some(referenced) = candidates.clone().find(|catalog| catalog.node.full_path == path)
        {
            return Some(referenced);
        }
        candidates.max_by(|a, b| {
            (a.node.created_at, &a.node.full_path).cmp(&(b.node.created_at, &b.node.full_path))
        })
    }

    /// Every document of `kind` other than the one at `keep`.
    pub fn surplus(&self, kind: DocumentKind, keep: &str) -> Vec<SurplusNode> {
        self.catalogs
            .iter()
            .filter(|catalog| catalog.kind == kind && catalog.node.full_path != keep)
            .map(|catalog| SurplusNode::from(&catalog.node))
            .collect()
    }

    /// Most recently stored version of a group document.
    pub fn latest_group(&self, name: &str, variant: GroupVariant) -> Option<&GroupNode> {
        self.groups
            .iter()
            .filter(|group| group.name == name && group.variant == variant)
            .max_by(|a, b| (a.node.created_at, &a.node.full_path).cmp(&(b.node.created_at, &b.node.full_path)))
    }

    /// Stored versions of a group document other than those at `keep`.
    pub fn group_surplus(&self, name: &str, keep: &[&str]) -> Vec<SurplusNode> {
        self.groups
            .iter()
            .filter(|group| group.name == name && !keep.contains(&group.node.full_path.as_str()))
            .map(|group| SurplusNode::from(&group.node))
            .collect()
    }
}
