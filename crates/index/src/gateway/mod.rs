//! Entry point for artifact uploads and removals.
//!
//! The gateway ties the engine together. An upload moves through these
//! states, each logged as it is reached:
//!
//! ```text
//! Received → PathResolved → Classified → IndexSkipped | IndexMerged
//!          → ArtifactPersisted → NodeRegistered → ManifestRebuilt → Completed
//! ```
//!
//! The artifact's bytes go to the content store before any catalog is
//! touched; they stay unreachable until the artifact's node is registered.
//! The deadline of an operation covers everything up to and including its
//! catalog commit. What follows the commit (registering or deleting the
//! artifact node, reverting the commit if that fails, rebuilding the
//! manifest) runs on its own task to completion, so a commit is never left
//! behind by a timeout or a dropped caller.
//!
//! A failed manifest rebuild is logged and otherwise ignored: the catalog
//! documents are already correct and the next rebuild picks them up.

mod response;

pub use self::response::{DeleteResponse, UploadResponse};
use crate::cache::ConfigCache;
use crate::classify::{Classification, classify};
use crate::cleaner::{SurplusCleaner, SurplusNode};
use crate::error::{ErrorKind, Result};
use crate::groups::store_group;
use crate::manifest::{Manifest, ManifestBuilder};
use crate::models::{IndexRoot, PackageMetadata, PackageNode, PackageReference, RepoKey};
use crate::parser::PackageParser;
use crate::resolve::{Resolution, index_root, repodata_root, resolve};
use crate::update::{Commit, IndexUpdater, Undo};
use derive_more::Display;
use exn::ResultExt;
use md5::{Digest, Md5};
use repomd_config::{Config, RepositoryConfig};
use repomd_storage::error::ErrorKind as StorageErrorKind;
use repomd_storage::{ContentHandle, Expect, NewNode, NodeHandle, file_name, sha256_hex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

const GROUP_EXTENSION: &str = ".xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum UploadState {
    Received,
    PathResolved,
    Classified,
    IndexSkipped,
    IndexMerged,
    ArtifactPersisted,
    NodeRegistered,
    ManifestRebuilt,
    Completed,
}

/// An artifact upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub repo: RepoKey,
    /// Repository-relative path, e.g. `centos/7/os/x86_64/p-1.0-1.x86_64.rpm`.
    pub path: String,
    pub content: Vec<u8>,
    /// Overrides the configured deadline.
    pub timeout: Option<Duration>,
    /// Whether different bytes already stored at the path may be replaced.
    /// Defaults to `true`.
    pub overwrite: bool,
}

impl UploadRequest {
    pub fn new(repo: RepoKey, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self { repo, path: path.into(), content: content.into(), timeout: None, overwrite: true }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// What an upload turned out to be, before anything is written.
enum Artifact {
    /// Stored without catalog participation.
    Opaque,
    /// The same bytes are already stored at the path.
    Duplicate { metadata: BTreeMap<String, String> },
    Group { root: IndexRoot, name: String },
    Package { reference: PackageReference, package: PackageMetadata, collision: bool },
}

/// What indexing did for an upload.
enum Indexing {
    /// The path is above every index root.
    Skipped { index_depth: usize },
    /// The same bytes were already indexed at the path.
    Unchanged,
    Package { reference: PackageReference, commit: Commit },
    Group { root: IndexRoot, name: String, superseded: Vec<SurplusNode> },
}

impl Indexing {
    fn changed_root(&self) -> Option<(&IndexRoot, &[SurplusNode])> {
        match self {
            Self::Package { reference, commit } => Some((&reference.root, &commit.superseded)),
            Self::Group { root, superseded, .. } => Some((root, superseded)),
            Self::Skipped { .. } | Self::Unchanged => None,
        }
    }

    fn describe(&self, path: &str) -> String {
        match self {
            Self::Skipped { index_depth } => {
                let reason = ErrorKind::Configuration(format!(
                    "`{path}` needs more than {index_depth} path segment(s) to be indexed"
                ));
                format!("stored without indexing ({reason})")
            },
            Self::Unchanged => "identical artifact already stored; catalogs unchanged".to_string(),
            Self::Package { reference, .. } => {
                format!("indexed as `{}` in index root `/{}`", reference.location, reference.root.prefix)
            },
            Self::Group { root, name, .. } => format!("group document `{name}` stored in index root `/{}`", root.prefix),
        }
    }
}

/// An upload whose catalogs are up to date and whose node is still to be
/// registered.
struct StagedUpload {
    repo: RepoKey,
    settings: Arc<RepositoryConfig>,
    path: String,
    full_path: String,
    size: u64,
    sha256: String,
    md5: String,
    indexing: Indexing,
    metadata: BTreeMap<String, String>,
}

/// A removal whose catalog records are gone and whose node is still to be
/// deleted.
struct StagedRemoval {
    repo: RepoKey,
    settings: Arc<RepositoryConfig>,
    path: String,
    full_path: String,
    revision: u64,
    committed: Option<(IndexRoot, Commit)>,
}

enum Removal {
    Finished(DeleteResponse),
    Staged(StagedRemoval),
}

/// Repository metadata gateway.
pub struct Gateway {
    nodes: NodeHandle,
    content: ContentHandle,
    parser: Arc<dyn PackageParser>,
    configs: ConfigCache,
    updater: IndexUpdater,
    manifests: ManifestBuilder,
    cleaner: SurplusCleaner,
    timeout: Duration,
}

impl Gateway {
    /// Build a gateway and start its surplus cleaner.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        nodes: NodeHandle,
        content: ContentHandle,
        parser: Arc<dyn PackageParser>,
        configs: ConfigCache,
        config: &Config,
    ) -> Self {
        Self {
            updater: IndexUpdater::new(nodes.clone(), content.clone(), &config.merge),
            manifests: ManifestBuilder::new(nodes.clone(), content.clone(), config.merge.max_attempts),
            cleaner: SurplusCleaner::spawn(nodes.clone(), config.cleaner.workers),
            timeout: config.timeout(),
            nodes,
            content,
            parser,
            configs,
        }
    }

    pub fn cleaner(&self) -> &SurplusCleaner {
        &self.cleaner
    }

    pub fn updater(&self) -> &IndexUpdater {
        &self.updater
    }

    /// Store an artifact and bring the catalogs of its index root up to date.
    ///
    /// # Errors
    /// - [`ErrorKind::UnknownRepository`] for unconfigured repositories
    /// - [`ErrorKind::Format`] for invalid paths and unreadable packages
    /// - [`ErrorKind::AlreadyExists`] for a refused overwrite
    /// - [`ErrorKind::Timeout`] when the deadline passes before the catalogs
    ///   are committed
    pub async fn on_upload(&self, request: UploadRequest) -> Result<UploadResponse> {
        let deadline = request.timeout.unwrap_or(self.timeout);
        let staged = tokio::time::timeout(deadline, self.stage_upload(request)).await.or_raise(|| ErrorKind::Timeout)??;
        tokio::spawn(self.completion().register(staged)).await.or_raise(|| ErrorKind::Storage)?
    }

    /// Remove an artifact, dropping its catalog records first.
    ///
    /// A missing artifact or catalog record is reported in the response
    /// rather than as an error, and in the latter case the artifact is kept.
    /// If the artifact node cannot be deleted, its records are put back.
    pub async fn on_remove(&self, repo: &RepoKey, path: &str) -> Result<DeleteResponse> {
        let removal =
            tokio::time::timeout(self.timeout, self.stage_removal(repo, path)).await.or_raise(|| ErrorKind::Timeout)??;
        match removal {
            Removal::Finished(response) => Ok(response),
            Removal::Staged(staged) => {
                tokio::spawn(self.completion().delete(staged)).await.or_raise(|| ErrorKind::Storage)?
            },
        }
    }

    /// Rewrite the manifest of the index root containing `path`.
    pub async fn rebuild_manifest(&self, repo: &RepoKey, path: &str) -> Result<Manifest> {
        let settings = self.configs.get(repo).await?;
        let root = index_root(repo, path, settings.index_depth)?;
        self.manifests.rebuild(&root, &settings).await
    }

    /// Rewrite the manifest of every index root of `repo` that has catalog
    /// nodes, in prefix order.
    ///
    /// Stops at the first root that fails.
    #[tracing::instrument(skip_all, fields(repo = %repo))]
    pub async fn rebuild_all_manifests(&self, repo: &RepoKey) -> Result<Vec<(IndexRoot, Manifest)>> {
        let settings = self.configs.get(repo).await?;
        let namespace = repo.to_string();
        let nodes = self.nodes.list(&namespace, true).await.or_raise(|| ErrorKind::Storage)?;
        let prefixes: BTreeSet<String> = nodes
            .iter()
            .filter_map(|node| node.full_path.strip_prefix(&namespace)?.strip_prefix('/'))
            .filter_map(|path| repodata_root(repo, path, settings.index_depth))
            .map(|root| root.prefix)
            .collect();
        tracing::info!(roots = prefixes.len(), "rebuilding every manifest");
        let mut manifests = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            let root = IndexRoot::new(repo.clone(), prefix);
            let manifest = self.manifests.rebuild(&root, &settings).await?;
            manifests.push((root, manifest));
        }
        Ok(manifests)
    }

    fn completion(&self) -> Completion {
        Completion {
            nodes: self.nodes.clone(),
            updater: self.updater.clone(),
            manifests: self.manifests.clone(),
            cleaner: self.cleaner.clone(),
        }
    }

    #[tracing::instrument(skip_all, fields(repo = %request.repo, path = %request.path))]
    async fn stage_upload(&self, request: UploadRequest) -> Result<StagedUpload> {
        let UploadRequest { repo, path, content, overwrite, .. } = request;
        transition(UploadState::Received);
        let settings = self.configs.get(&repo).await?;
        let resolution = resolve(&repo, &path, settings.index_depth)?;
        transition(UploadState::PathResolved);

        let sha256 = sha256_hex(&content);
        let md5 = format!("{:x}", Md5::digest(&content));
        let full_path = repo.node_path(resolution.path());
        let classification = classify(&*self.nodes, &full_path, &sha256).await?;
        if classification.is_collision() && !overwrite {
            exn::bail!(ErrorKind::AlreadyExists(resolution.path().to_string()));
        }
        transition(UploadState::Classified);

        let artifact = self.inspect(&resolution, &classification, &content, &sha256)?;
        self.content.store(&sha256, &content).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(%sha256, "artifact bytes stored");

        let (indexing, metadata) = self.index(&settings, artifact, &content, &sha256, &md5).await?;
        match indexing {
            Indexing::Skipped { .. } | Indexing::Unchanged => transition(UploadState::IndexSkipped),
            Indexing::Package { .. } | Indexing::Group { .. } => transition(UploadState::IndexMerged),
        }
        Ok(StagedUpload {
            repo,
            settings,
            path: resolution.path().to_string(),
            full_path,
            size: content.len() as u64,
            sha256,
            md5,
            indexing,
            metadata,
        })
    }

    /// Work out what the upload is without writing anything.
    fn inspect(
        &self,
        resolution: &Resolution,
        classification: &Classification,
        content: &[u8],
        sha256: &str,
    ) -> Result<Artifact> {
        let Resolution::Indexed { path, root, location } = resolution else {
            return Ok(Artifact::Opaque);
        };
        if let Classification::ExactDuplicate(existing) = classification {
            return Ok(Artifact::Duplicate { metadata: existing.metadata.clone() });
        }
        if location.ends_with(GROUP_EXTENSION) {
            return Ok(Artifact::Group { root: root.clone(), name: file_name(location).to_string() });
        }
        let package = self
            .parser
            .parse(path, content)
            .or_raise(|| ErrorKind::Format(format!("could not read package metadata from `{path}`")))?;
        tracing::trace!(name = %package.name, "package metadata read");
        let reference = PackageReference {
            root: root.clone(),
            location: location.clone(),
            content_hash: sha256.to_string(),
            size: content.len() as u64,
        };
        Ok(Artifact::Package { reference, package, collision: classification.is_collision() })
    }

    /// Update the catalogs for an upload. Returns the node metadata to
    /// register the artifact with.
    async fn index(
        &self,
        settings: &RepositoryConfig,
        artifact: Artifact,
        content: &[u8],
        sha256: &str,
        md5: &str,
    ) -> Result<(Indexing, BTreeMap<String, String>)> {
        match artifact {
            Artifact::Opaque => Ok((Indexing::Skipped { index_depth: settings.index_depth }, BTreeMap::new())),
            Artifact::Duplicate { metadata } => Ok((Indexing::Unchanged, metadata)),
            Artifact::Group { root, name } => {
                let stored = store_group(&*self.nodes, &*self.content, &root, &name, content).await?;
                Ok((Indexing::Group { root, name, superseded: stored.superseded }, BTreeMap::new()))
            },
            Artifact::Package { reference, package, collision } => {
                let commit = self.updater.apply_upsert(settings, &package, &reference, collision).await?;
                let identity = PackageNode { name: package.name, arch: package.arch, version: package.version };
                Ok((Indexing::Package { reference, commit }, identity.metadata(sha256, md5)))
            },
        }
    }

    #[tracing::instrument(skip_all, fields(repo = %repo, path = %path))]
    async fn stage_removal(&self, repo: &RepoKey, path: &str) -> Result<Removal> {
        let settings = self.configs.get(repo).await?;
        let resolution = resolve(repo, path, settings.index_depth)?;
        let path = resolution.path();
        let full_path = repo.node_path(path);
        let Some(node) = self.nodes.get(&full_path).await.or_raise(|| ErrorKind::Storage)? else {
            tracing::info!("nothing to remove");
            return Ok(Removal::Finished(DeleteResponse::kept(repo, path, "artifact not found")));
        };

        let mut committed = None;
        if let Resolution::Indexed { root, location, .. } = &resolution
            && let Some(identity) = PackageNode::from_node(&node)?
        {
            let reference = PackageReference {
                root: root.clone(),
                location: location.clone(),
                content_hash: node.content_hash.clone(),
                size: node.size,
            };
            match self.updater.apply_delete(&settings, &reference, Some(&identity)).await {
                Ok(commit) => committed = Some((root.clone(), commit)),
                Err(e) if matches!(&*e, ErrorKind::IndexNotFound(_)) => {
                    tracing::warn!(%location, "no catalog record for artifact; keeping it");
                    let description = format!("{}; artifact kept", &*e);
                    return Ok(Removal::Finished(DeleteResponse::kept(repo, path, description)));
                },
                Err(e) => return Err(e),
            }
        }
        Ok(Removal::Staged(StagedRemoval {
            repo: repo.clone(),
            settings,
            path: path.to_string(),
            full_path,
            revision: node.revision,
            committed,
        }))
    }
}

/// Everything that follows a catalog commit. Owned, so it can run on its
/// own task.
#[derive(Clone)]
struct Completion {
    nodes: NodeHandle,
    updater: IndexUpdater,
    manifests: ManifestBuilder,
    cleaner: SurplusCleaner,
}

impl Completion {
    #[tracing::instrument(skip_all, fields(repo = %staged.repo, path = %staged.path))]
    async fn register(self, staged: StagedUpload) -> Result<UploadResponse> {
        transition(UploadState::ArtifactPersisted);
        let request = NewNode::new(&staged.full_path, &staged.sha256, staged.size).with_metadata(staged.metadata.clone());
        if let Err(e) = self.nodes.create(request).await {
            if let Indexing::Package { reference, commit } = &staged.indexing {
                self.revert(&staged.settings, &reference.root, commit).await;
            }
            return Err(e.raise(ErrorKind::Storage));
        }
        transition(UploadState::NodeRegistered);

        if let Some((root, superseded)) = staged.indexing.changed_root()
            && self.refresh(root, &staged.settings, superseded.to_vec()).await
        {
            transition(UploadState::ManifestRebuilt);
        }
        transition(UploadState::Completed);
        let description = staged.indexing.describe(&staged.path);
        tracing::info!(%description, "upload completed");
        Ok(UploadResponse::new(&staged.repo, &staged.path, &staged.sha256, &staged.md5, description))
    }

    #[tracing::instrument(skip_all, fields(repo = %staged.repo, path = %staged.path))]
    async fn delete(self, staged: StagedRemoval) -> Result<DeleteResponse> {
        let StagedRemoval { repo, settings, path, full_path, revision, committed } = staged;
        match self.nodes.delete_expecting(&full_path, Expect::Revision(revision)).await {
            Ok(()) => {},
            Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => tracing::debug!("artifact already gone"),
            Err(e) => {
                let kind = match &*e {
                    StorageErrorKind::Conflict(_) => ErrorKind::Conflict(format!("`{path}` was rewritten during removal")),
                    _ => ErrorKind::Storage,
                };
                if let Some((root, commit)) = &committed {
                    self.revert(&settings, root, commit).await;
                }
                return Err(e.raise(kind));
            },
        }

        let description = match committed {
            Some((root, commit)) => {
                self.refresh(&root, &settings, commit.superseded).await;
                format!("removed along with its catalog records in index root `/{}`", root.prefix)
            },
            None => "removed".to_string(),
        };
        tracing::info!(%description, "removal completed");
        Ok(DeleteResponse::removed(&repo, &path, description))
    }

    /// Rebuild the manifest of `root`, then hand `superseded` to the cleaner
    /// now that the manifest no longer references them.
    async fn refresh(&self, root: &IndexRoot, settings: &RepositoryConfig, superseded: Vec<SurplusNode>) -> bool {
        match self.manifests.rebuild(root, settings).await {
            Ok(_) => {
                self.cleaner.submit(superseded);
                true
            },
            Err(e) => {
                tracing::warn!(%root, error = ?e, "manifest rebuild failed; it stays stale until the next one");
                false
            },
        }
    }

    /// Best-effort undo of `commit` after the step following it failed.
    async fn revert(&self, settings: &RepositoryConfig, root: &IndexRoot, commit: &Commit) {
        let Undo { location, .. } = &commit.undo;
        if commit.undo.is_empty() {
            return;
        }
        match self.updater.revert(settings, root, &commit.undo).await {
            Ok(reverted) => {
                tracing::info!(%location, "reverted catalog records");
                let superseded = commit.superseded.iter().cloned().chain(reverted.superseded).collect();
                self.refresh(root, settings, superseded).await;
            },
            Err(e) => {
                tracing::warn!(%location, error = ?e, "could not revert catalog records");
                self.refresh(root, settings, Vec::new()).await;
            },
        }
    }
}

fn transition(state: UploadState) {
    tracing::debug!(%state, "upload state");
}
