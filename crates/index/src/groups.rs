//! Storage of uploaded group documents (`comps.xml` and friends).
//!
//! A group document is kept twice inside `repodata`: as uploaded, and
//! gzip-compressed. Both copies are content addressed like catalog
//! documents, so every upload of a changed document adds a new pair.

use crate::cleaner::SurplusNode;
use crate::document::Element;
use crate::error::{ErrorKind, Result};
use crate::models::{DocumentStats, GroupNode, GroupVariant, IndexRoot};
use crate::snapshot::RepodataSnapshot;
use exn::ResultExt;
use repomd_compress::Compression;
use repomd_storage::{ContentStore, NewNode, NodeStore, sha256_hex};
use time::UtcDateTime;

/// The stored copies of one group document upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGroup {
    pub plain: GroupNode,
    pub gzip: GroupNode,
    /// Earlier versions of the same document.
    pub superseded: Vec<SurplusNode>,
}

/// Store `xml` as the group document `name` of `root`.
///
/// # Errors
/// [`ErrorKind::Format`] if `xml` is not well-formed. Nothing is written in
/// that case.
#[tracing::instrument(level = "debug", skip(nodes, content, xml), fields(root = %root, size = xml.len()))]
pub async fn store_group(
    nodes: &dyn NodeStore,
    content: &dyn ContentStore,
    root: &IndexRoot,
    name: &str,
    xml: &[u8],
) -> Result<StoredGroup> {
    Element::parse(xml).or_raise(|| ErrorKind::Format(format!("group document `{name}` is not well-formed XML")))?;
    let timestamp = UtcDateTime::now().unix_timestamp();

    let plain_stats =
        DocumentStats { checksum: sha256_hex(xml), size: xml.len() as u64, timestamp, open_checksum: None, open_size: None };
    let gzipped = Compression::Gzip
        .compress(xml)
        .or_raise(|| ErrorKind::Format(format!("could not compress group document `{name}`")))?;
    let gzip_stats = DocumentStats {
        checksum: sha256_hex(&gzipped),
        size: gzipped.len() as u64,
        timestamp,
        open_checksum: Some(plain_stats.checksum.clone()),
        open_size: Some(plain_stats.size),
    };

    let snapshot = RepodataSnapshot::load(nodes, root).await?;
    let plain = persist(nodes, content, root, name, GroupVariant::Plain, plain_stats, xml).await?;
    let gzip = persist(nodes, content, root, name, GroupVariant::Gzip, gzip_stats, &gzipped).await?;
    let superseded = snapshot.group_surplus(name, &[&plain.node.full_path, &gzip.node.full_path]);
    Ok(StoredGroup { plain, gzip, superseded })
}

async fn persist(
    nodes: &dyn NodeStore,
    content: &dyn ContentStore,
    root: &IndexRoot,
    name: &str,
    variant: GroupVariant,
    stats: DocumentStats,
    bytes: &[u8],
) -> Result<GroupNode> {
    let file_name = match variant {
        GroupVariant::Plain => format!("{}-{name}", stats.checksum),
        GroupVariant::Gzip => format!("{}-{name}.gz", stats.checksum),
    };
    content.store(&stats.checksum, bytes).await.or_raise(|| ErrorKind::Storage)?;
    let request = NewNode::new(root.repodata_file(&file_name), &stats.checksum, stats.size)
        .with_metadata(GroupNode::metadata(name, variant, &stats));
    let node = nodes.create(request).await.or_raise(|| ErrorKind::Storage)?;
    Ok(GroupNode { name: name.to_string(), variant, stats, node })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{root, stores};

    const COMPS: &[u8] = b"<?xml version=\"1.0\"?><comps><group><id>core</id></group></comps>";

    #[tokio::test]
    async fn test_store_both_copies() {
        let (nodes, content) = stores();
        let root = root("a");
        let stored = store_group(&*nodes, &*content, &root, "comps.xml", COMPS).await.unwrap();
        assert!(stored.plain.node.full_path.ends_with("-comps.xml"));
        assert!(stored.gzip.node.full_path.ends_with("-comps.xml.gz"));
        assert_eq!(stored.gzip.stats.open_checksum.as_deref(), Some(stored.plain.stats.checksum.as_str()));
        let gzipped = content.load_bytes(&stored.gzip.node.content_hash).await.unwrap();
        assert_eq!(Compression::Gzip.decompress(&gzipped).unwrap(), COMPS);
        assert!(stored.superseded.is_empty());
    }

    #[tokio::test]
    async fn test_new_version_supersedes_old() {
        let (nodes, content) = stores();
        let root = root("a");
        let first = store_group(&*nodes, &*content, &root, "comps.xml", COMPS).await.unwrap();
        let second = store_group(&*nodes, &*content, &root, "comps.xml", b"<comps/>").await.unwrap();
        let mut superseded: Vec<_> = second.superseded.into_iter().map(|s| s.path).collect();
        superseded.sort();
        let mut expected = vec![first.plain.node.full_path, first.gzip.node.full_path];
        expected.sort();
        assert_eq!(superseded, expected);
    }

    #[tokio::test]
    async fn test_malformed_xml() {
        let (nodes, content) = stores();
        let err = store_group(&*nodes, &*content, &root("a"), "comps.xml", b"<comps>").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
        assert!(nodes.paths().await.is_empty());
    }
}
