//! Incremental updates of the catalog documents of an index root.
//!
//! One package change touches several document kinds. Each attempt takes a
//! [`RepodataSnapshot`], merges the change into the canonical document of
//! every affected kind, stores the results as new content-addressed nodes
//! and then moves the index head to them with a single compare-and-swap.
//! Losing the swap to another writer means starting over from the newer
//! documents; nothing a losing attempt stored is ever referenced.
//!
//! Every [`Commit`] carries an [`Undo`] describing the records it displaced,
//! so a caller whose follow-up step fails can put them back with
//! [`IndexUpdater::revert`].

use crate::cleaner::SurplusNode;
use crate::document::{AnyRecord, CatalogDocument, EncodedDocument, RecordHeader};
use crate::error::{ErrorKind, Result};
use crate::models::{CatalogNode, DocumentKind, IndexRoot, PackageMetadata, PackageNode, PackageReference};
use crate::snapshot::RepodataSnapshot;
use exn::ResultExt;
use repomd_compress::Compression;
use repomd_config::{MergeConfig, RepositoryConfig};
use repomd_storage::content::BoxSyncRead;
use repomd_storage::error::ErrorKind as StorageErrorKind;
use repomd_storage::{ContentHandle, Expect, NewNode, NodeHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const BACKOFF_STEP: Duration = Duration::from_millis(10);

/// Result of a committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Generation of the index root after the commit.
    pub generation: u64,
    /// Documents the index head now points at.
    pub documents: Vec<CatalogNode>,
    /// Documents of the changed kinds that are no longer referenced.
    pub superseded: Vec<SurplusNode>,
    /// Kinds the change did not apply to and that were left as they were.
    pub skipped: Vec<DocumentKind>,
    /// What the commit replaced at its location.
    pub undo: Undo,
}

/// The records a commit displaced at one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undo {
    pub location: String,
    /// One entry per kind the commit changed.
    pub displaced: Vec<Displaced>,
}

impl Undo {
    pub fn is_empty(&self) -> bool {
        self.displaced.is_empty()
    }
}

/// One kind's record at an [`Undo`] location, before and after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displaced {
    pub kind: DocumentKind,
    /// Position and record before the commit.
    pub before: Option<(usize, AnyRecord)>,
    /// Header of the record the commit left in place.
    pub after: Option<RecordHeader>,
}

struct Merged {
    encoded: EncodedDocument,
    displaced: Displaced,
}

#[derive(Debug)]
enum Change {
    Upsert { package: PackageMetadata, reference: PackageReference, collision: bool },
    Delete { location: String, expected: Option<PackageNode> },
    Revert(Undo),
}

impl Change {
    fn location(&self) -> &str {
        match self {
            Self::Upsert { reference, .. } => &reference.location,
            Self::Delete { location, .. } => location,
            Self::Revert(undo) => &undo.location,
        }
    }
}

struct Base {
    compression: Compression,
    reader: BoxSyncRead,
}

/// Applies package changes to catalog documents.
#[derive(Clone)]
pub struct IndexUpdater {
    nodes: NodeHandle,
    content: ContentHandle,
    gate: Arc<Semaphore>,
    max_attempts: u32,
}

impl IndexUpdater {
    pub fn new(nodes: NodeHandle, content: ContentHandle, config: &MergeConfig) -> Self {
        Self {
            nodes,
            content,
            gate: Arc::new(Semaphore::new(config.workers.max(1))),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Add or replace the records of `package` at `reference`.
    ///
    /// A collision must find a record to replace in the primary document.
    /// The other kinds fall back to inserting, so enabling file lists on a
    /// populated repository does not break re-uploads.
    ///
    /// # Errors
    /// - [`ErrorKind::CollisionResolution`] if `collision` is set and the
    ///   primary document has no record to replace
    /// - [`ErrorKind::Conflict`] if every attempt lost the race for the head
    #[tracing::instrument(skip_all, fields(root = %reference.root, location = %reference.location, collision = collision))]
    pub async fn apply_upsert(
        &self,
        settings: &RepositoryConfig,
        package: &PackageMetadata,
        reference: &PackageReference,
        collision: bool,
    ) -> Result<Commit> {
        let kinds = DocumentKind::enabled(settings.include_file_lists).collect();
        let change = Change::Upsert { package: package.clone(), reference: reference.clone(), collision };
        self.commit(&reference.root, kinds, settings.compression, Arc::new(change)).await
    }

    /// Remove the records at `reference` from the primary and other
    /// documents.
    ///
    /// File lists are left as they are. With `expected` set, a record only
    /// counts as present when its name, architecture and version match.
    ///
    /// # Errors
    /// [`ErrorKind::IndexNotFound`] if the primary document has no matching
    /// record. Nothing is written in that case.
    #[tracing::instrument(skip_all, fields(root = %reference.root, location = %reference.location))]
    pub async fn apply_delete(
        &self,
        settings: &RepositoryConfig,
        reference: &PackageReference,
        expected: Option<&PackageNode>,
    ) -> Result<Commit> {
        let change = Change::Delete { location: reference.location.clone(), expected: expected.cloned() };
        self.commit(&reference.root, DocumentKind::on_delete().to_vec(), settings.compression, Arc::new(change))
            .await
    }

    /// Put back the records `undo` displaced.
    ///
    /// A kind whose record has changed again since the commit is left as it
    /// is, so a later writer's record is never overwritten.
    #[tracing::instrument(skip_all, fields(%root, location = %undo.location))]
    pub async fn revert(&self, settings: &RepositoryConfig, root: &IndexRoot, undo: &Undo) -> Result<Commit> {
        let kinds = undo.displaced.iter().map(|displaced| displaced.kind).collect();
        self.commit(root, kinds, settings.compression, Arc::new(Change::Revert(undo.clone()))).await
    }

    /// Decode the canonical document of `kind`, if there is one.
    pub async fn load_document(&self, root: &IndexRoot, kind: DocumentKind) -> Result<Option<CatalogDocument>> {
        let snapshot = RepodataSnapshot::load(&*self.nodes, root).await?;
        let Some(catalog) = snapshot.canonical(kind) else {
            return Ok(None);
        };
        let bytes = self.content.load_bytes(&catalog.node.content_hash).await.or_raise(|| ErrorKind::Storage)?;
        let compression = Compression::from_path(&catalog.node.full_path);
        if !compression.check_magic_bytes(&bytes) {
            exn::bail!(ErrorKind::CorruptDocument(format!("{} is not {compression} data", catalog.node.full_path)));
        }
        CatalogDocument::decode(kind, compression, bytes.as_slice()).map(Some)
    }

    async fn commit(
        &self,
        root: &IndexRoot,
        kinds: Vec<DocumentKind>,
        compression: Compression,
        change: Arc<Change>,
    ) -> Result<Commit> {
        for attempt in 1..=self.max_attempts {
            if let Some(commit) = self.attempt(root, &kinds, compression, &change).await? {
                tracing::debug!(attempt, generation = commit.generation, "committed index update");
                return Ok(commit);
            }
            tracing::debug!(attempt, "index head moved; retrying from the new documents");
            if attempt < self.max_attempts {
                tokio::time::sleep(BACKOFF_STEP * attempt).await;
            }
        }
        tracing::warn!(%root, attempts = self.max_attempts, "giving up on contended index root");
        exn::bail!(ErrorKind::Conflict(root.to_string()))
    }

    /// One merge cycle. `None` means another writer moved the head first.
    async fn attempt(
        &self,
        root: &IndexRoot,
        kinds: &[DocumentKind],
        compression: Compression,
        change: &Arc<Change>,
    ) -> Result<Option<Commit>> {
        let snapshot = RepodataSnapshot::load(&*self.nodes, root).await?;
        let mut bases = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let base = match snapshot.canonical(kind) {
                Some(catalog) => Some(Base {
                    compression: Compression::from_path(&catalog.node.full_path),
                    reader: self.content.load(&catalog.node.content_hash).await.or_raise(|| ErrorKind::Storage)?,
                }),
                None => None,
            };
            bases.push((kind, base));
        }

        let merged = self.merge(bases, change.clone(), compression).await?;

        let mut head = snapshot.head.as_ref().map(|head| head.metadata.clone()).unwrap_or_default();
        let (mut documents, mut superseded, mut skipped) = (Vec::new(), Vec::new(), Vec::new());
        let mut undo = Undo { location: change.location().to_string(), displaced: Vec::new() };
        for (kind, merged) in merged {
            let Some(Merged { encoded, displaced }) = merged else {
                skipped.push(kind);
                continue;
            };
            undo.displaced.push(displaced);
            let catalog = self.persist(root, encoded).await?;
            head.insert(kind.as_str().to_string(), catalog.node.full_path.clone());
            superseded.extend(snapshot.surplus(kind, &catalog.node.full_path));
            documents.push(catalog);
        }

        let expect = match &snapshot.head {
            Some(head) => Expect::Revision(head.revision),
            None => Expect::Absent,
        };
        let request = NewNode::metadata_only(root.head_path()).with_metadata(head).expecting(expect);
        match self.nodes.create(request).await {
            Ok(head) => Ok(Some(Commit { generation: head.revision, documents, superseded, skipped, undo })),
            Err(e) if matches!(&*e, StorageErrorKind::Conflict(_)) => Ok(None),
            Err(e) => Err(e.raise(ErrorKind::Storage)),
        }
    }

    /// Decode, change and re-encode every base on the blocking pool.
    async fn merge(
        &self,
        bases: Vec<(DocumentKind, Option<Base>)>,
        change: Arc<Change>,
        compression: Compression,
    ) -> Result<Vec<(DocumentKind, Option<Merged>)>> {
        let permit = self.gate.clone().acquire_owned().await.or_raise(|| ErrorKind::Storage)?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            bases
                .into_iter()
                .map(|(kind, base)| merge_one(kind, base, &change, compression).map(|merged| (kind, merged)))
                .collect::<Result<Vec<_>>>()
        })
        .await
        .or_raise(|| ErrorKind::Storage)?
    }

    /// Store a document's bytes, then register its node.
    async fn persist(&self, root: &IndexRoot, encoded: EncodedDocument) -> Result<CatalogNode> {
        let path = root.repodata_file(&encoded.file_name());
        let hash = &encoded.stats.checksum;
        self.content.store(hash, &encoded.bytes).await.or_raise(|| ErrorKind::Storage)?;
        let request = NewNode::new(&path, hash, encoded.stats.size)
            .with_metadata(CatalogNode::metadata(encoded.kind, &encoded.stats));
        let node = self.nodes.create(request).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(%path, records = encoded.records, "stored catalog document");
        Ok(CatalogNode { kind: encoded.kind, stats: encoded.stats, node })
    }
}

/// Apply `change` to one document kind.
///
/// Returns `None` when the kind is left untouched.
fn merge_one(kind: DocumentKind, base: Option<Base>, change: &Change, compression: Compression) -> Result<Option<Merged>> {
    let mut document = match base {
        Some(base) => CatalogDocument::decode(kind, base.compression, base.reader)?,
        None => CatalogDocument::empty(kind),
    };
    let location = change.location();
    let before = document.record(location);
    match change {
        Change::Upsert { package, reference, collision } => {
            document.upsert(package, reference, *collision && kind == DocumentKind::Primary)?
        },
        Change::Delete { location, expected } => {
            let present = document
                .header(location)
                .is_some_and(|header| expected.as_ref().is_none_or(|expected| identifies(expected, header)));
            if !present {
                if kind == DocumentKind::Primary {
                    exn::bail!(ErrorKind::IndexNotFound(location.clone()));
                }
                tracing::warn!(%kind, %location, "no record to remove; document left as is");
                return Ok(None);
            }
            document.remove(location);
        },
        Change::Revert(undo) => {
            let Some(displaced) = undo.displaced.iter().find(|displaced| displaced.kind == kind) else {
                return Ok(None);
            };
            if document.header(location) != displaced.after.as_ref() {
                tracing::warn!(%kind, %location, "record changed since the reverted commit; document left as is");
                return Ok(None);
            }
            document.restore(location, displaced.before.as_ref())?;
        },
    }
    let after = document.header(location).cloned();
    let encoded = document.encode(compression)?;
    Ok(Some(Merged { encoded, displaced: Displaced { kind, before, after } }))
}

fn identifies(expected: &PackageNode, header: &RecordHeader) -> bool {
    expected.name == header.name && expected.arch == header.arch && expected.version == header.version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{package, reference, root, settings, stores};
    use async_trait::async_trait;
    use repomd_storage::nodes::{MockNodeStore, NodeStream, Operation};
    use repomd_storage::{ContentStore, Node, NodeStore};

    fn updater(nodes: NodeHandle, content: ContentHandle) -> IndexUpdater {
        IndexUpdater::new(nodes, content, &MergeConfig { workers: 2, max_attempts: 3 })
    }

    async fn locations(updater: &IndexUpdater, root: &IndexRoot, kind: DocumentKind) -> Vec<String> {
        match updater.load_document(root, kind).await.unwrap() {
            Some(document) => document.locations().into_iter().map(str::to_string).collect(),
            None => Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_first_upsert_creates_every_kind() {
        let (nodes, content) = stores();
        let updater = updater(nodes.clone(), content);
        let root = root("a");
        let commit =
            updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap();
        assert_eq!(commit.generation, 1);
        assert_eq!(commit.documents.len(), 3);
        assert!(commit.superseded.is_empty());
        for kind in DocumentKind::ALL {
            assert_eq!(locations(&updater, &root, kind).await, vec!["p.rpm"]);
        }
        let head = nodes.get(&root.head_path()).await.unwrap().unwrap();
        assert_eq!(head.meta("primary"), Some(commit.documents[0].node.full_path.as_str()));
    }

    #[tokio::test]
    async fn test_file_lists_disabled() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        let settings = RepositoryConfig { include_file_lists: false, ..settings(1) };
        let commit = updater.apply_upsert(&settings, &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap();
        assert_eq!(commit.documents.iter().map(|d| d.kind).collect::<Vec<_>>(), [DocumentKind::Primary, DocumentKind::Others]);
        assert!(updater.load_document(&root, DocumentKind::FileLists).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_upsert_supersedes_previous_documents() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        let first =
            updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap();
        let second =
            updater.apply_upsert(&settings(1), &package("q", "1.0"), &reference(&root, "q.rpm"), false).await.unwrap();
        assert_eq!(second.generation, 2);
        let superseded: Vec<_> = second.superseded.iter().map(|s| s.path.as_str()).collect();
        let previous: Vec<_> = first.documents.iter().map(|d| d.node.full_path.as_str()).collect();
        assert_eq!(superseded.len(), 3);
        assert!(superseded.iter().all(|path| previous.contains(path)));
        assert_eq!(locations(&updater, &root, DocumentKind::Primary).await, vec!["p.rpm", "q.rpm"]);
    }

    #[tokio::test]
    async fn test_collision_replaces_in_place() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        for name in ["p", "q"] {
            let location = format!("{name}.rpm");
            updater.apply_upsert(&settings(1), &package(name, "1.0"), &reference(&root, &location), false).await.unwrap();
        }
        updater.apply_upsert(&settings(1), &package("p", "2.0"), &reference(&root, "p.rpm"), true).await.unwrap();
        let primary = updater.load_document(&root, DocumentKind::Primary).await.unwrap().unwrap();
        assert_eq!(primary.locations(), vec!["p.rpm", "q.rpm"]);
        assert_eq!(primary.header("p.rpm").unwrap().version.ver, "2.0");
    }

    #[tokio::test]
    async fn test_collision_without_record() {
        let (nodes, content) = stores();
        let updater = updater(nodes.clone(), content);
        let root = root("a");
        let err =
            updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), true).await.unwrap_err();
        assert_eq!(*err, ErrorKind::CollisionResolution("p.rpm".into()));
        assert!(nodes.get(&root.head_path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_keeps_file_lists() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap();
        let commit = updater.apply_delete(&settings(1), &reference(&root, "p.rpm"), None).await.unwrap();
        assert_eq!(commit.documents.len(), 2);
        assert!(commit.skipped.is_empty());
        assert!(locations(&updater, &root, DocumentKind::Primary).await.is_empty());
        assert!(locations(&updater, &root, DocumentKind::Others).await.is_empty());
        assert_eq!(locations(&updater, &root, DocumentKind::FileLists).await, vec!["p.rpm"]);
    }

    #[tokio::test]
    async fn test_delete_missing_record_writes_nothing() {
        let (nodes, content) = stores();
        let updater = updater(nodes.clone(), content);
        let root = root("a");
        updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap();
        let before = nodes.paths().await;
        let err = updater.apply_delete(&settings(1), &reference(&root, "q.rpm"), None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::IndexNotFound("q.rpm".into()));
        assert_eq!(nodes.paths().await, before);
    }

    #[tokio::test]
    async fn test_delete_checks_identity() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        let metadata = package("p", "1.0");
        updater.apply_upsert(&settings(1), &metadata, &reference(&root, "p.rpm"), false).await.unwrap();
        let other = PackageNode { name: "p".into(), arch: "x86_64".into(), version: crate::models::Version::new(0, "9", "1") };
        let err = updater.apply_delete(&settings(1), &reference(&root, "p.rpm"), Some(&other)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::IndexNotFound(_)));
        let own = PackageNode { name: metadata.name, arch: metadata.arch, version: metadata.version };
        updater.apply_delete(&settings(1), &reference(&root, "p.rpm"), Some(&own)).await.unwrap();
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_head_alone() {
        let (nodes, content) = stores();
        let updater = updater(nodes.clone(), content);
        let root = root("a");
        nodes.fail(Operation::Create, "-other.xml");
        let err =
            updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Storage);
        assert!(nodes.get(&root.head_path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_document_rejects_mislabelled_bytes() {
        let (nodes, content) = stores();
        let updater = updater(nodes.clone(), content.clone());
        let root = root("a");
        let xml = b"<metadata packages=\"0\"/>";
        let hash = repomd_storage::sha256_hex(xml);
        content.store(&hash, xml).await.unwrap();
        let stats = crate::models::DocumentStats {
            checksum: hash.clone(),
            size: xml.len() as u64,
            timestamp: 0,
            open_checksum: Some(hash.clone()),
            open_size: Some(xml.len() as u64),
        };
        let request = NewNode::new(root.repodata_file(&format!("{hash}-primary.xml.gz")), &hash, stats.size)
            .with_metadata(CatalogNode::metadata(DocumentKind::Primary, &stats));
        nodes.create(request).await.unwrap();
        let err = updater.load_document(&root, DocumentKind::Primary).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CorruptDocument(_)));
    }

    #[tokio::test]
    async fn test_collision_after_enabling_file_lists() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        let without = RepositoryConfig { include_file_lists: false, ..settings(1) };
        updater.apply_upsert(&without, &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap();

        let commit = updater.apply_upsert(&settings(1), &package("p", "2.0"), &reference(&root, "p.rpm"), true).await.unwrap();
        assert_eq!(commit.documents.len(), 3);
        assert_eq!(locations(&updater, &root, DocumentKind::FileLists).await, vec!["p.rpm"]);
        let primary = updater.load_document(&root, DocumentKind::Primary).await.unwrap().unwrap();
        assert_eq!(primary.header("p.rpm").unwrap().version.ver, "2.0");
    }

    #[tokio::test]
    async fn test_revert_insert() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap();
        let commit =
            updater.apply_upsert(&settings(1), &package("q", "1.0"), &reference(&root, "q.rpm"), false).await.unwrap();
        assert_eq!(commit.undo.location, "q.rpm");
        assert!(commit.undo.displaced.iter().all(|displaced| displaced.before.is_none()));

        updater.revert(&settings(1), &root, &commit.undo).await.unwrap();
        for kind in DocumentKind::ALL {
            assert_eq!(locations(&updater, &root, kind).await, vec!["p.rpm"]);
        }
    }

    #[tokio::test]
    async fn test_revert_collision_restores_previous_record() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        for name in ["p", "q"] {
            let location = format!("{name}.rpm");
            updater.apply_upsert(&settings(1), &package(name, "1.0"), &reference(&root, &location), false).await.unwrap();
        }
        let before = updater.load_document(&root, DocumentKind::Primary).await.unwrap().unwrap();
        let commit =
            updater.apply_upsert(&settings(1), &package("p", "2.0"), &reference(&root, "p.rpm"), true).await.unwrap();
        updater.revert(&settings(1), &root, &commit.undo).await.unwrap();
        let after = updater.load_document(&root, DocumentKind::Primary).await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_revert_delete_reinserts_in_place() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        for name in ["p", "q", "r"] {
            let location = format!("{name}.rpm");
            updater.apply_upsert(&settings(1), &package(name, "1.0"), &reference(&root, &location), false).await.unwrap();
        }
        let commit = updater.apply_delete(&settings(1), &reference(&root, "q.rpm"), None).await.unwrap();
        let kinds: Vec<_> = commit.undo.displaced.iter().map(|displaced| displaced.kind).collect();
        assert_eq!(kinds, DocumentKind::on_delete());
        updater.revert(&settings(1), &root, &commit.undo).await.unwrap();
        for kind in DocumentKind::ALL {
            assert_eq!(locations(&updater, &root, kind).await, vec!["p.rpm", "q.rpm", "r.rpm"]);
        }
    }

    #[tokio::test]
    async fn test_revert_keeps_newer_record() {
        let (nodes, content) = stores();
        let updater = updater(nodes, content);
        let root = root("a");
        let first =
            updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap();
        updater.apply_upsert(&settings(1), &package("p", "2.0"), &reference(&root, "p.rpm"), true).await.unwrap();
        let commit = updater.revert(&settings(1), &root, &first.undo).await.unwrap();
        assert_eq!(commit.skipped.len(), 3);
        let primary = updater.load_document(&root, DocumentKind::Primary).await.unwrap().unwrap();
        assert_eq!(primary.header("p.rpm").unwrap().version.ver, "2.0");
    }

    /// Node store whose index heads always look freshly moved.
    #[derive(Default)]
    struct Contended(MockNodeStore);

    #[async_trait]
    impl NodeStore for Contended {
        fn name(&self) -> &str {
            "contended"
        }

        async fn get(&self, path: &str) -> repomd_storage::error::Result<Option<Node>> {
            self.0.get(path).await
        }

        fn list_stream<'a>(&'a self, prefix: &'a str, recursive: bool) -> NodeStream<'a> {
            self.0.list_stream(prefix, recursive)
        }

        async fn create(&self, node: NewNode) -> repomd_storage::error::Result<Node> {
            if node.full_path.ends_with("/.head") {
                exn::bail!(StorageErrorKind::Conflict(node.full_path));
            }
            self.0.create(node).await
        }

        async fn delete_expecting(&self, path: &str, expect: Expect) -> repomd_storage::error::Result<()> {
            self.0.delete_expecting(path, expect).await
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (_, content) = stores();
        let updater = updater(Arc::new(Contended::default()), content);
        let root = root("a");
        let err =
            updater.apply_upsert(&settings(1), &package("p", "1.0"), &reference(&root, "p.rpm"), false).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Conflict(root.to_string()));
        assert!(err.is_retryable());
    }
}
