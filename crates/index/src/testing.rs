//! Fixtures shared by the unit tests of this crate.

use crate::error::{ErrorKind, Result};
use crate::models::{
    ChangelogEntry, Checksum, FileEntry, FileKind, IndexRoot, PackageMetadata, PackageReference, RepoKey, Version,
};
use repomd_config::RepositoryConfig;
use repomd_storage::content::MockContentStore;
use repomd_storage::nodes::MockNodeStore;
use std::sync::Arc;

pub(crate) fn repo() -> RepoKey {
    RepoKey::new("proj", "rpms")
}

pub(crate) fn root(prefix: &str) -> IndexRoot {
    IndexRoot::new(repo(), prefix)
}

pub(crate) fn stores() -> (Arc<MockNodeStore>, Arc<MockContentStore>) {
    (Arc::new(MockNodeStore::default()), Arc::new(MockContentStore::default()))
}

pub(crate) fn settings(index_depth: usize) -> RepositoryConfig {
    RepositoryConfig { index_depth, ..Default::default() }
}

pub(crate) fn package(name: &str, ver: &str) -> PackageMetadata {
    PackageMetadata {
        name: name.to_string(),
        arch: "x86_64".to_string(),
        version: Version::new(0, ver, "1"),
        checksum: Checksum::sha256(format!("{name}-{ver}")),
        installed_size: 2048,
        archive_size: 1024,
        files: vec![
            FileEntry::new(format!("/usr/bin/{name}"), FileKind::File),
            FileEntry::new(format!("/usr/share/doc/{name}"), FileKind::Dir),
        ],
        changelogs: vec![ChangelogEntry { author: "Packager <p@example.com>".into(), date: 1_700_000_000, text: format!("- {ver}") }],
    }
}

pub(crate) fn reference(root: &IndexRoot, location: &str) -> PackageReference {
    PackageReference { root: root.clone(), location: location.to_string(), content_hash: "00".repeat(32), size: 512 }
}

/// Reads package bytes of the form `name-ver-rel.arch`.
///
/// Content starting with `bad` is rejected.
pub(crate) fn parse_package(_path: &str, bytes: &[u8]) -> Result<PackageMetadata> {
    let text = std::str::from_utf8(bytes).map_err(|_| exn::Exn::from(ErrorKind::Format("not utf-8".into())))?;
    if text.starts_with("bad") {
        exn::bail!(ErrorKind::Format(format!("unreadable package `{text}`")));
    }
    let (nvr, arch) = text.rsplit_once('.').unwrap_or((text, "noarch"));
    let mut parts = nvr.rsplitn(3, '-');
    let (rel, ver, name) = (parts.next().unwrap_or("1"), parts.next().unwrap_or("0"), parts.next().unwrap_or(nvr));
    let mut metadata = package(name, ver);
    metadata.version.rel = rel.to_string();
    metadata.arch = arch.to_string();
    metadata.checksum = Checksum::sha256(repomd_storage::sha256_hex(bytes));
    Ok(metadata)
}
