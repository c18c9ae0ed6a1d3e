//! Typed views of node metadata.
//!
//! Node stores only keep string maps. Everything the engine writes into them
//! is read back through the types here, so a malformed map is rejected once
//! at the load boundary instead of at every use.

use super::{DocumentKind, Version};
use crate::error::{Error, ErrorKind, Result};
use exn::OptionExt;
use repomd_storage::Node;
use std::collections::BTreeMap;
use std::str::FromStr;

pub(crate) const INDEX_TYPE: &str = "indexType";
pub(crate) const INDEX_NAME: &str = "indexName";
pub(crate) const CHECKSUM: &str = "checksum";
pub(crate) const SIZE: &str = "size";
pub(crate) const TIMESTAMP: &str = "timestamp";
pub(crate) const OPEN_CHECKSUM: &str = "openChecksum";
pub(crate) const OPEN_SIZE: &str = "openSize";

const GROUP: &str = "group";
const GROUP_GZ: &str = "group_gz";

/// Checksums and sizes of a stored document, as advertised in `repomd.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStats {
    /// SHA-256 of the stored bytes.
    pub checksum: String,
    pub size: u64,
    /// Unix seconds.
    pub timestamp: i64,
    /// SHA-256 of the uncompressed XML, for compressed documents.
    pub open_checksum: Option<String>,
    pub open_size: Option<u64>,
}
impl DocumentStats {
    fn write(&self, metadata: &mut BTreeMap<String, String>) {
        metadata.insert(CHECKSUM.to_string(), self.checksum.clone());
        metadata.insert(SIZE.to_string(), self.size.to_string());
        metadata.insert(TIMESTAMP.to_string(), self.timestamp.to_string());
        if let Some(open_checksum) = &self.open_checksum {
            metadata.insert(OPEN_CHECKSUM.to_string(), open_checksum.clone());
        }
        if let Some(open_size) = self.open_size {
            metadata.insert(OPEN_SIZE.to_string(), open_size.to_string());
        }
    }

    fn read(node: &Node) -> Result<Self> {
        Ok(Self {
            checksum: required(node, CHECKSUM)?.to_string(),
            size: parsed(node, SIZE)?,
            timestamp: parsed(node, TIMESTAMP)?,
            open_checksum: node.meta(OPEN_CHECKSUM).map(str::to_string),
            open_size: node.meta(OPEN_SIZE).map(|_| parsed(node, OPEN_SIZE)).transpose()?,
        })
    }
}

/// One stored version of a catalog document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogNode {
    pub kind: DocumentKind,
    pub stats: DocumentStats,
    pub node: Node,
}
impl CatalogNode {
    pub fn metadata(kind: DocumentKind, stats: &DocumentStats) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::from([(INDEX_TYPE.to_string(), kind.to_string())]);
        stats.write(&mut metadata);
        metadata
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupVariant {
    Plain,
    Gzip,
}
impl GroupVariant {
    /// `type` of the document in `repomd.xml`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => GROUP,
            Self::Gzip => GROUP_GZ,
        }
    }
}

/// One stored version of an uploaded group document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    /// File name the document was uploaded as, e.g. `comps.xml`.
    pub name: String,
    pub variant: GroupVariant,
    pub stats: DocumentStats,
    pub node: Node,
}
impl GroupNode {
    pub fn metadata(name: &str, variant: GroupVariant, stats: &DocumentStats) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::from([
            (INDEX_TYPE.to_string(), variant.as_str().to_string()),
            (INDEX_NAME.to_string(), name.to_string()),
        ]);
        stats.write(&mut metadata);
        metadata
    }
}

/// A node written by the engine into a `repodata` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexNode {
    Catalog(CatalogNode),
    Group(GroupNode),
}

impl IndexNode {
    /// Whether `node` claims to be an index node at all.
    pub fn is_tagged(node: &Node) -> bool {
        node.meta(INDEX_TYPE).is_some()
    }
}

impl TryFrom<&Node> for IndexNode {
    type Error = Error;

    fn try_from(node: &Node) -> Result<Self> {
        let stats = DocumentStats::read(node)?;
        let variant = match required(node, INDEX_TYPE)? {
            GROUP => GroupVariant::Plain,
            GROUP_GZ => GroupVariant::Gzip,
            kind => {
                let kind = DocumentKind::from_str(kind)?;
                if stats.open_checksum.is_none() || stats.open_size.is_none() {
                    exn::bail!(ErrorKind::CorruptDocument(format!("{}: missing open checksum", node.full_path)));
                }
                return Ok(Self::Catalog(CatalogNode { kind, stats, node: node.clone() }));
            },
        };
        let name = required(node, INDEX_NAME)?.to_string();
        Ok(Self::Group(GroupNode { name, variant, stats, node: node.clone() }))
    }
}

/// Catalog identity recorded on an uploaded package node.
///
/// Lets a later removal check that the record it is about to drop belongs to
/// the package being removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    pub name: String,
    pub arch: String,
    pub version: Version,
}
impl PackageNode {
    pub fn metadata(&self, sha256: &str, md5: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("name".to_string(), self.name.clone()),
            ("arch".to_string(), self.arch.clone()),
            ("epoch".to_string(), self.version.epoch.to_string()),
            ("ver".to_string(), self.version.ver.clone()),
            ("rel".to_string(), self.version.rel.clone()),
            ("sha256".to_string(), sha256.to_string()),
            ("md5".to_string(), md5.to_string()),
        ])
    }

    /// Read back package identity, or `None` for nodes stored without one
    /// (opaque uploads and group documents).
    pub fn from_node(node: &Node) -> Result<Option<Self>> {
        if node.meta("name").is_none() {
            return Ok(None);
        }
        let version = Version::new(parsed(node, "epoch")?, required(node, "ver")?, required(node, "rel")?);
        Ok(Some(Self { name: required(node, "name")?.to_string(), arch: required(node, "arch")?.to_string(), version }))
    }
}

fn required<'a>(node: &'a Node, key: &str) -> Result<&'a str> {
    node.meta(key)
        .ok_or_raise(|| ErrorKind::CorruptDocument(format!("{}: missing metadata `{key}`", node.full_path)))
}

fn parsed<T: FromStr>(node: &Node, key: &str) -> Result<T> {
    required(node, key)?.parse().map_err(|_| {
        exn::Exn::from(ErrorKind::CorruptDocument(format!("{}: malformed metadata `{key}`", node.full_path)))
    })
}
