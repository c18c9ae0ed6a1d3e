//! The `repomd.xml` manifest of an index root.
//!
//! The manifest is the entry point for clients: it lists the canonical
//! document of every catalog kind and every configured group document,
//! with checksums and sizes. It is the only index node that is overwritten
//! in place, so every write is guarded twice:
//!
//! - the node carries the generation of the index head it was built from,
//!   and a builder never replaces a manifest from a newer generation, and
//! - the overwrite is a compare-and-swap on the node's revision.

use crate::document::{Element, XmlWriter};
use crate::error::{ErrorKind, Result, corrupt};
use crate::models::{DocumentKind, DocumentStats, GroupVariant, IndexRoot};
use crate::snapshot::RepodataSnapshot;
use exn::ResultExt;
use repomd_config::RepositoryConfig;
use repomd_storage::error::ErrorKind as StorageErrorKind;
use repomd_storage::{ContentHandle, Expect, NewNode, Node, NodeHandle, file_name, sha256_hex};
use std::time::Duration;

const REPO_NAMESPACE: &str = "http://linux.duke.edu/metadata/repo";
const RPM_NAMESPACE: &str = "http://linux.duke.edu/metadata/rpm";
const GENERATION: &str = "generation";
const BACKOFF_STEP: Duration = Duration::from_millis(10);

/// One `<data>` element of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// `primary`, `filelists`, `other`, `group` or `group_gz`.
    pub data_type: String,
    /// Location relative to the index root, e.g. `repodata/<digest>-primary.xml.gz`.
    pub location: String,
    pub stats: DocumentStats,
}
impl ManifestEntry {
    fn new(data_type: &str, node: &Node, stats: &DocumentStats) -> Self {
        Self {
            data_type: data_type.to_string(),
            location: format!("repodata/{}", file_name(&node.full_path)),
            stats: stats.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Generation of the index root the manifest describes.
    pub revision: u64,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Manifest of the documents visible in `snapshot`.
    ///
    /// Catalog kinds come first in their fixed order, then group documents
    /// by name, each as plain followed by gzip.
    pub(crate) fn from_snapshot(snapshot: &RepodataSnapshot, settings: &RepositoryConfig) -> Self {
        let mut entries = Vec::new();
        for kind in DocumentKind::enabled(settings.include_file_lists) {
            if let Some(catalog) = snapshot.canonical(kind) {
                entries.push(ManifestEntry::new(kind.as_str(), &catalog.node, &catalog.stats));
            }
        }
        for name in &settings.group_documents {
            for variant in [GroupVariant::Plain, GroupVariant::Gzip] {
                if let Some(group) = snapshot.latest_group(name, variant) {
                    entries.push(ManifestEntry::new(variant.as_str(), &group.node, &group.stats));
                }
            }
        }
        Self { revision: snapshot.generation(), entries }
    }

    pub fn entry(&self, data_type: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|entry| entry.data_type == data_type)
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = XmlWriter::new()?;
        writer.start("repomd", &[("xmlns", REPO_NAMESPACE), ("xmlns:rpm", RPM_NAMESPACE)])?;
        writer.text("revision", &[], &self.revision.to_string())?;
        for entry in &self.entries {
            let stats = &entry.stats;
            writer.start("data", &[("type", &entry.data_type)])?;
            writer.text("checksum", &[("type", "sha256")], &stats.checksum)?;
            if let Some(open_checksum) = &stats.open_checksum {
                writer.text("open-checksum", &[("type", "sha256")], open_checksum)?;
            }
            writer.empty("location", &[("href", &entry.location)])?;
            writer.text("timestamp", &[], &stats.timestamp.to_string())?;
            writer.text("size", &[], &stats.size.to_string())?;
            if let Some(open_size) = stats.open_size {
                writer.text("open-size", &[], &open_size.to_string())?;
            }
            writer.end("data")?;
        }
        writer.end("repomd")?;
        Ok(writer.finish())
    }

    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let root = Element::parse(xml)?;
        if root.name != "repomd" {
            exn::bail!(corrupt(format!("expected <repomd>, found <{}>", root.name)));
        }
        let revision = number(root.child_text("revision")?)?;
        let entries = root
            .children_named("data")
            .map(|data| -> Result<ManifestEntry> {
                Ok(ManifestEntry {
                    data_type: data.required_attr("type")?.to_string(),
                    location: data.required_child("location")?.required_attr("href")?.to_string(),
                    stats: DocumentStats {
                        checksum: data.child_text("checksum")?.to_string(),
                        size: number(data.child_text("size")?)?,
                        timestamp: number(data.child_text("timestamp")?)?,
                        open_checksum: data.child("open-checksum").map(|e| e.text.clone()),
                        open_size: data.child("open-size").map(|e| number(&e.text)).transpose()?,
                    },
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self { revision, entries })
    }
}

fn number<T: std::str::FromStr>(text: &str) -> Result<T> {
    text.trim().parse().map_err(|_| exn::Exn::from(corrupt(format!("`{text}` is not a number"))))
}

/// Rebuilds manifests from the current state of an index root.
#[derive(Clone)]
pub struct ManifestBuilder {
    nodes: NodeHandle,
    content: ContentHandle,
    max_attempts: u32,
}

impl ManifestBuilder {
    pub fn new(nodes: NodeHandle, content: ContentHandle, max_attempts: u32) -> Self {
        Self { nodes, content, max_attempts: max_attempts.max(1) }
    }

    /// Write the manifest of `root` and return the manifest now in place.
    ///
    /// Safe to call at any time, including to repair a root whose manifest
    /// was lost: rebuilding an unchanged root leaves the stored manifest
    /// untouched, and a manifest written for a newer generation is kept.
    #[tracing::instrument(skip_all, fields(root = %root))]
    pub async fn rebuild(&self, root: &IndexRoot, settings: &RepositoryConfig) -> Result<Manifest> {
        for attempt in 1..=self.max_attempts {
            let snapshot = RepodataSnapshot::load(&*self.nodes, root).await?;
            let manifest = Manifest::from_snapshot(&snapshot, settings);
            let xml = manifest.to_xml()?;
            let hash = sha256_hex(&xml);

            let expect = match &snapshot.manifest {
                Some(current) => {
                    let current_generation: u64 = current.meta(GENERATION).and_then(|g| g.parse().ok()).unwrap_or(0);
                    if current_generation > manifest.revision {
                        tracing::debug!(current_generation, "a newer manifest is already in place");
                        return self.load(current).await;
                    }
                    if current_generation == manifest.revision && current.content_hash == hash {
                        tracing::debug!("manifest is up to date");
                        return Ok(manifest);
                    }
                    Expect::Revision(current.revision)
                },
                None => Expect::Absent,
            };

            self.content.store(&hash, &xml).await.or_raise(|| ErrorKind::Storage)?;
            let request = NewNode::new(root.manifest_path(), &hash, xml.len() as u64)
                .with_entry(GENERATION, manifest.revision.to_string())
                .expecting(expect);
            match self.nodes.create(request).await {
                Ok(_) => {
                    tracing::info!(generation = manifest.revision, entries = manifest.entries.len(), "manifest rebuilt");
                    return Ok(manifest);
                },
                Err(e) if matches!(&*e, StorageErrorKind::Conflict(_)) => {
                    tracing::debug!(attempt, "manifest changed underneath; rebuilding");
                    if attempt < self.max_attempts {
                        tokio::time::sleep(BACKOFF_STEP * attempt).await;
                    }
                },
                Err(e) => return Err(e.raise(ErrorKind::Storage)),
            }
        }
        exn::bail!(ErrorKind::Conflict(root.to_string()))
    }

    /// Read back the stored manifest of `root`, if there is one.
    pub async fn current(&self, root: &IndexRoot) -> Result<Option<Manifest>> {
        match self.nodes.get(&root.manifest_path()).await.or_raise(|| ErrorKind::Storage)? {
            Some(node) => self.load(&node).await.map(Some),
            None => Ok(None),
        }
    }

    async fn load(&self, node: &Node) -> Result<Manifest> {
        let xml = self.content.load_bytes(&node.content_hash).await.or_raise(|| ErrorKind::Storage)?;
        Manifest::from_xml(&xml)
    }
}
