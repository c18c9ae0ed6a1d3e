use crate::error::{ErrorKind, Result};
use derive_more::Display;
use repomd_compress::Compression;
use std::str::FromStr;

/// The three catalog documents of an index root.
///
/// Ordering is the order kinds appear in `repomd.xml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum DocumentKind {
    #[display("primary")]
    Primary,
    #[display("filelists")]
    FileLists,
    #[display("other")]
    Others,
}

impl DocumentKind {
    pub const ALL: [Self; 3] = [Self::Primary, Self::FileLists, Self::Others];

    /// Kinds maintained for a repository.
    pub fn enabled(include_file_lists: bool) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |kind| include_file_lists || *kind != Self::FileLists)
    }

    /// Kinds a package removal touches. File lists are left alone.
    pub fn on_delete() -> [Self; 2] {
        [Self::Primary, Self::Others]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::FileLists => "filelists",
            Self::Others => "other",
        }
    }

    pub(crate) fn root_element(self) -> &'static str {
        match self {
            Self::Primary => "metadata",
            Self::FileLists => "filelists",
            Self::Others => "otherdata",
        }
    }

    pub(crate) fn namespace(self) -> &'static str {
        match self {
            Self::Primary => "http://linux.duke.edu/metadata/common",
            Self::FileLists => "http://linux.duke.edu/metadata/filelists",
            Self::Others => "http://linux.duke.edu/metadata/other",
        }
    }

    /// Name of a stored document: `<digest>-<kind>.xml<ext>`.
    pub fn file_name(self, digest: &str, compression: Compression) -> String {
        format!("{digest}-{self}.xml{}", compression.extension())
    }
}

impl FromStr for DocumentKind {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary" => Ok(Self::Primary),
            "filelists" => Ok(Self::FileLists),
            "other" => Ok(Self::Others),
            _ => exn::bail!(ErrorKind::CorruptDocument(format!("unknown catalog kind `{s}`"))),
        }
    }
}
