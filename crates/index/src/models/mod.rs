//! Identities and metadata shared by every component of the engine.

mod kind;
mod node_meta;
mod package;

pub use self::kind::DocumentKind;
pub use self::node_meta::{CatalogNode, DocumentStats, GroupNode, GroupVariant, IndexNode, PackageNode};
pub use self::package::{ChangelogEntry, Checksum, FileEntry, FileKind, PackageMetadata, Version};
use derive_more::Display;
use repomd_storage::join_path;

pub(crate) const REPODATA: &str = "repodata";
const HEAD: &str = ".head";
const MANIFEST: &str = "repomd.xml";

/// A repository, addressed as `project/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{project_id}/{repo_name}")]
pub struct RepoKey {
    pub project_id: String,
    pub repo_name: String,
}
impl RepoKey {
    pub fn new(project_id: impl Into<String>, repo_name: impl Into<String>) -> Self {
        Self { project_id: project_id.into(), repo_name: repo_name.into() }
    }

    /// Node store path of a repository-relative path.
    pub fn node_path(&self, path: &str) -> String {
        join_path(&self.to_string(), path)
    }
}

/// One catalog scope: a repository plus the path prefix its packages share.
///
/// All catalog documents, the index head and the manifest of the scope live
/// in `<prefix>/repodata/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{repo}:/{prefix}")]
pub struct IndexRoot {
    pub repo: RepoKey,
    /// Repository-relative prefix; empty when the index depth is zero.
    pub prefix: String,
}
impl IndexRoot {
    pub fn new(repo: RepoKey, prefix: impl Into<String>) -> Self {
        Self { repo, prefix: prefix.into() }
    }

    /// Node store path of the `repodata` directory.
    pub fn repodata(&self) -> String {
        self.repo.node_path(&join_path(&self.prefix, REPODATA))
    }

    /// Node store path of a file inside `repodata`.
    pub fn repodata_file(&self, name: &str) -> String {
        join_path(&self.repodata(), name)
    }

    /// Metadata-only node whose revision is the generation of the root.
    pub fn head_path(&self) -> String {
        self.repodata_file(HEAD)
    }

    pub fn manifest_path(&self) -> String {
        self.repodata_file(MANIFEST)
    }

    /// Node store path of a package given its location below the root.
    pub fn package_path(&self, location: &str) -> String {
        self.repo.node_path(&join_path(&self.prefix, location))
    }
}

/// Identity of one indexable package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub root: IndexRoot,
    /// Path of the package relative to the root; the catalog record key.
    pub location: String,
    pub content_hash: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_paths() {
        let root = IndexRoot::new(RepoKey::new("proj", "rpms"), "centos/7");
        assert_eq!(root.repodata(), "proj/rpms/centos/7/repodata");
        assert_eq!(root.head_path(), "proj/rpms/centos/7/repodata/.head");
        assert_eq!(root.manifest_path(), "proj/rpms/centos/7/repodata/repomd.xml");
        assert_eq!(root.package_path("os/x86_64/p.rpm"), "proj/rpms/centos/7/os/x86_64/p.rpm");
        assert_eq!(root.to_string(), "proj/rpms:/centos/7");
    }

    #[test]
    fn test_empty_prefix() {
        let root = IndexRoot::new(RepoKey::new("proj", "rpms"), "");
        assert_eq!(root.repodata(), "proj/rpms/repodata");
        assert_eq!(root.package_path("p.rpm"), "proj/rpms/p.rpm");
    }
}
