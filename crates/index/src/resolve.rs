//! Splitting upload paths into an index root and a catalog location.

use crate::error::{ErrorKind, Result};
use crate::models::{IndexRoot, REPODATA, RepoKey};
use exn::ResultExt;
use repomd_storage::validate_path;

/// Where an upload lands relative to the catalogs of its repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path is deep enough to take part in an index root.
    Indexed { path: String, root: IndexRoot, location: String },
    /// The path is too shallow; the artifact is stored as an opaque file.
    Skipped { path: String },
}
impl Resolution {
    /// Normalised repository-relative path of the upload.
    pub fn path(&self) -> &str {
        match self {
            Self::Indexed { path, .. } | Self::Skipped { path } => path,
        }
    }
}

/// Resolve a repository-relative upload `path` against an `index_depth`.
///
/// The first `index_depth` segments form the index root prefix and the rest
/// is the catalog location. A path needs strictly more segments than the
/// depth to be indexed, so that the location is never empty.
///
/// # Errors
/// Returns [`ErrorKind::Format`] if the path is empty, escapes the
/// repository, contains forbidden characters or points into the `repodata`
/// directory of its index root.
pub fn resolve(repo: &RepoKey, path: &str, index_depth: usize) -> Result<Resolution> {
    let path = validate_path(path).or_raise(|| ErrorKind::Format(format!("invalid path `{path}`")))?;
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() <= index_depth {
        return Ok(Resolution::Skipped { path });
    }
    let (prefix, location) = segments.split_at(index_depth);
    let root = IndexRoot::new(repo.clone(), prefix.join("/"));
    if location.first() == Some(&REPODATA) {
        exn::bail!(ErrorKind::Format(format!("`{path}` is inside the catalog directory of its index root")));
    }
    let location = location.join("/");
    Ok(Resolution::Indexed { path, root, location })
}

/// The index root containing `path`, which may be the root's own prefix.
///
/// # Errors
/// [`ErrorKind::Configuration`] if `path` has fewer segments than
/// `index_depth` and so lies above every index root.
pub fn index_root(repo: &RepoKey, path: &str, index_depth: usize) -> Result<IndexRoot> {
    let path = match path.trim_matches('/') {
        "" => String::new(),
        _ => validate_path(path).or_raise(|| ErrorKind::Format(format!("invalid path `{path}`")))?,
    };
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    if segments.len() < index_depth {
        exn::bail!(ErrorKind::Configuration(format!(
            "`{path}` has {} segment(s) but the index depth is {index_depth}",
            segments.len()
        )));
    }
    Ok(IndexRoot::new(repo.clone(), segments[..index_depth].join("/")))
}

/// The index root owning a repository-relative `path` that lies inside a
/// `repodata` directory at `index_depth`.
pub(crate) fn repodata_root(repo: &RepoKey, path: &str, index_depth: usize) -> Option<IndexRoot> {
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    match segments.get(index_depth) {
        Some(&REPODATA) if segments.len() > index_depth + 1 => {
            Some(IndexRoot::new(repo.clone(), segments[..index_depth].join("/")))
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn repo() -> RepoKey {
        RepoKey::new("proj", "rpms")
    }

    #[test]
    fn test_indexed_path() {
        let resolution = resolve(&repo(), "a/b/1.0/x86_64/p-1.0-1.pkg", 2).unwrap();
        let Resolution::Indexed { root, location, .. } = resolution else {
            panic!("expected an indexed path");
        };
        assert_eq!(root.prefix, "a/b");
        assert_eq!(location, "1.0/x86_64/p-1.0-1.pkg");
    }

    #[rstest]
    #[case::shorter("a/b", 3)]
    #[case::equal("a/b/p.rpm", 3)]
    fn test_shallow_path_is_skipped(#[case] path: &str, #[case] depth: usize) {
        let resolution = resolve(&repo(), path, depth).unwrap();
        assert_eq!(resolution, Resolution::Skipped { path: path.to_string() });
    }

    #[test]
    fn test_zero_depth_indexes_at_repository_root() {
        let Resolution::Indexed { root, location, .. } = resolve(&repo(), "/p.rpm", 0).unwrap() else {
            panic!("expected an indexed path");
        };
        assert_eq!(root.prefix, "");
        assert_eq!(location, "p.rpm");
    }

    #[test]
    fn test_path_is_normalised() {
        let resolution = resolve(&repo(), "//a/./b/c.rpm", 1).unwrap();
        assert_eq!(resolution.path(), "a/b/c.rpm");
    }

    #[rstest]
    #[case::exact("a/b", 2, "a/b")]
    #[case::deeper("a/b/c/p.rpm", 2, "a/b")]
    #[case::repository_root("", 0, "")]
    #[case::slash("/", 0, "")]
    fn test_index_root(#[case] path: &str, #[case] depth: usize, #[case] prefix: &str) {
        assert_eq!(index_root(&repo(), path, depth).unwrap(), IndexRoot::new(repo(), prefix));
    }

    #[test]
    fn test_index_root_above_depth() {
        let err = index_root(&repo(), "a", 2).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
    }

    #[rstest]
    #[case::manifest("a/repodata/repomd.xml", 1)]
    #[case::head("a/repodata/.head", 1)]
    #[case::directory("a/repodata", 1)]
    #[case::repository_root("repodata/x.rpm", 0)]
    fn test_catalog_directory_is_reserved(#[case] path: &str, #[case] depth: usize) {
        let err = resolve(&repo(), path, depth).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }

    #[rstest]
    #[case::deeper("a/b/repodata/p.rpm", 1)]
    #[case::suffix("a/repodata.rpm", 1)]
    fn test_repodata_elsewhere_is_indexed(#[case] path: &str, #[case] depth: usize) {
        assert!(matches!(resolve(&repo(), path, depth).unwrap(), Resolution::Indexed { .. }));
    }

    #[rstest]
    #[case::manifest("a/b/repodata/repomd.xml", 2, Some("a/b"))]
    #[case::repository_root("repodata/.head", 0, Some(""))]
    #[case::package("a/b/p.rpm", 2, None)]
    #[case::wrong_depth("a/repodata/repomd.xml", 2, None)]
    #[case::directory_only("a/b/repodata", 2, None)]
    fn test_repodata_root(#[case] path: &str, #[case] depth: usize, #[case] prefix: Option<&str>) {
        assert_eq!(repodata_root(&repo(), path, depth), prefix.map(|prefix| IndexRoot::new(repo(), prefix)));
    }

    #[rstest]
    #[case::escape("../p.rpm")]
    #[case::empty("/")]
    #[case::nul("a/\0.rpm")]
    fn test_invalid_path(#[case] path: &str) {
        let err = resolve(&repo(), path, 1).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Format(_)));
    }
}
