use derive_more::Display;

/// RPM version triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Display)]
#[display("{epoch}:{ver}-{rel}")]
pub struct Version {
    pub epoch: u32,
    pub ver: String,
    pub rel: String,
}
impl Version {
    pub fn new(epoch: u32, ver: impl Into<String>, rel: impl Into<String>) -> Self {
        Self { epoch, ver: ver.into(), rel: rel.into() }
    }
}

/// Package checksum as advertised in catalogs, e.g. `sha256`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Checksum {
    pub kind: String,
    pub value: String,
}
impl Checksum {
    pub fn sha256(value: impl Into<String>) -> Self {
        Self { kind: "sha256".to_string(), value: value.into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FileKind {
    #[default]
    File,
    Dir,
    Ghost,
}
impl FileKind {
    /// Value of the `type` attribute; plain files carry none.
    pub fn as_attribute(self) -> Option<&'static str> {
        match self {
            Self::File => None,
            Self::Dir => Some("dir"),
            Self::Ghost => Some("ghost"),
        }
    }

    pub fn from_attribute(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("file") => Some(Self::File),
            Some("dir") => Some(Self::Dir),
            Some("ghost") => Some(Self::Ghost),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    pub path: String,
    pub kind: FileKind,
}
impl FileEntry {
    pub fn new(path: impl Into<String>, kind: FileKind) -> Self {
        Self { path: path.into(), kind }
    }

    /// Whether the file belongs in the primary catalog.
    ///
    /// Depsolvers resolve file requirements against this subset without
    /// downloading the full file lists.
    pub fn is_primary(&self) -> bool {
        self.path.starts_with("/etc/") || self.path.contains("bin/") || self.path == "/usr/lib/sendmail"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangelogEntry {
    pub author: String,
    /// Unix seconds.
    pub date: i64,
    pub text: String,
}

/// Structured package metadata as produced by a
/// [`PackageParser`](crate::PackageParser).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    pub arch: String,
    pub version: Version,
    pub checksum: Checksum,
    pub installed_size: u64,
    pub archive_size: u64,
    pub files: Vec<FileEntry>,
    pub changelogs: Vec<ChangelogEntry>,
}
