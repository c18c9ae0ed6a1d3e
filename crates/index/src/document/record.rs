//! Per-kind catalog records.
//!
//! Every record starts with the same [`RecordHeader`] (identity, checksum,
//! sizes and location); what follows depends on the kind of document:
//! primary files, the full file list or the changelog.

use super::xml::{Element, XmlWriter};
use crate::error::{Result, corrupt};
use crate::models::{
    ChangelogEntry, Checksum, DocumentKind, FileEntry, FileKind, PackageMetadata, PackageReference, Version,
};
use std::fmt::Debug;

/// Fields shared by the records of every document kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub name: String,
    pub arch: String,
    pub version: Version,
    pub checksum: Checksum,
    pub package_size: u64,
    pub installed_size: u64,
    pub archive_size: u64,
    /// Package path relative to the index root; unique within a document.
    pub location: String,
}

impl RecordHeader {
    pub fn new(package: &PackageMetadata, reference: &PackageReference) -> Self {
        Self {
            name: package.name.clone(),
            arch: package.arch.clone(),
            version: package.version.clone(),
            checksum: package.checksum.clone(),
            package_size: reference.size,
            installed_size: package.installed_size,
            archive_size: package.archive_size,
            location: reference.location.clone(),
        }
    }

    fn write(&self, writer: &mut XmlWriter) -> Result<()> {
        writer.text("name", &[], &self.name)?;
        writer.text("arch", &[], &self.arch)?;
        let epoch = self.version.epoch.to_string();
        writer.empty("version", &[("epoch", &epoch), ("ver", &self.version.ver), ("rel", &self.version.rel)])?;
        writer.text("checksum", &[("type", &self.checksum.kind), ("pkgid", "YES")], &self.checksum.value)?;
        let (package, installed, archive) =
            (self.package_size.to_string(), self.installed_size.to_string(), self.archive_size.to_string());
        writer.empty("size", &[("package", &package), ("installed", &installed), ("archive", &archive)])?;
        writer.empty("location", &[("href", &self.location)])
    }

    fn read(element: &Element) -> Result<Self> {
        let version = element.required_child("version")?;
        let checksum = element.required_child("checksum")?;
        let size = element.required_child("size")?;
        Ok(Self {
            name: element.child_text("name")?.to_string(),
            arch: element.child_text("arch")?.to_string(),
            version: Version::new(
                version.number_attr("epoch")?,
                version.required_attr("ver")?,
                version.required_attr("rel")?,
            ),
            checksum: Checksum { kind: checksum.required_attr("type")?.to_string(), value: checksum.text.clone() },
            package_size: size.number_attr("package")?,
            installed_size: size.number_attr("installed")?,
            archive_size: size.number_attr("archive")?,
            location: element.required_child("location")?.required_attr("href")?.to_string(),
        })
    }
}

/// A package record of one document kind.
pub trait Record: Debug + Clone + PartialEq + Send + Sync + 'static {
    const KIND: DocumentKind;

    fn from_package(header: RecordHeader, package: &PackageMetadata) -> Self;

    fn header(&self) -> &RecordHeader;

    /// Write the kind-specific elements that follow the header.
    fn write_body(&self, writer: &mut XmlWriter) -> Result<()>;

    /// Read the kind-specific elements of a `<package>` element.
    fn read_body(header: RecordHeader, element: &Element) -> Result<Self>;

    fn location(&self) -> &str {
        &self.header().location
    }

    fn write(&self, writer: &mut XmlWriter) -> Result<()> {
        writer.start("package", &[("type", "rpm")])?;
        self.header().write(writer)?;
        self.write_body(writer)?;
        writer.end("package")
    }

    fn read(element: &Element) -> Result<Self> {
        Self::read_body(RecordHeader::read(element)?, element)
    }
}

fn write_files<'a>(writer: &mut XmlWriter, files: impl IntoIterator<Item = &'a FileEntry>) -> Result<()> {
    for file in files {
        match file.kind.as_attribute() {
            Some(kind) => writer.text("file", &[("type", kind)], &file.path)?,
            None => writer.text("file", &[], &file.path)?,
        }
    }
    Ok(())
}

fn read_files(element: &Element) -> Result<Vec<FileEntry>> {
    element
        .children_named("file")
        .map(|file| -> Result<FileEntry> {
            let kind = FileKind::from_attribute(file.attr("type"))
                .ok_or_else(|| corrupt(format!("unknown file type on `{}`", file.text)))?;
            Ok(FileEntry::new(file.text.clone(), kind))
        })
        .collect()
}

/// Record of the `primary` document: header plus the primary files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryRecord {
    pub header: RecordHeader,
    pub files: Vec<FileEntry>,
}

impl Record for PrimaryRecord {
    const KIND: DocumentKind = DocumentKind::Primary;

    fn from_package(header: RecordHeader, package: &PackageMetadata) -> Self {
        Self { header, files: package.files.iter().filter(|file| file.is_primary()).cloned().collect() }
    }

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        writer.start("format", &[])?;
        write_files(writer, &self.files)?;
        writer.end("format")
    }

    fn read_body(header: RecordHeader, element: &Element) -> Result<Self> {
        let files = match element.child("format") {
            Some(format) => read_files(format)?,
            None => Vec::new(),
        };
        Ok(Self { header, files })
    }
}

/// Record of the `filelists` document: header plus every file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListsRecord {
    pub header: RecordHeader,
    pub files: Vec<FileEntry>,
}

impl Record for FileListsRecord {
    const KIND: DocumentKind = DocumentKind::FileLists;

    fn from_package(header: RecordHeader, package: &PackageMetadata) -> Self {
        Self { header, files: package.files.clone() }
    }

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        write_files(writer, &self.files)
    }

    fn read_body(header: RecordHeader, element: &Element) -> Result<Self> {
        Ok(Self { header, files: read_files(element)? })
    }
}

/// Record of the `other` document: header plus the changelog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OthersRecord {
    pub header: RecordHeader,
    pub changelogs: Vec<ChangelogEntry>,
}

impl Record for OthersRecord {
    const KIND: DocumentKind = DocumentKind::Others;

    fn from_package(header: RecordHeader, package: &PackageMetadata) -> Self {
        Self { header, changelogs: package.changelogs.clone() }
    }

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn write_body(&self, writer: &mut XmlWriter) -> Result<()> {
        for entry in &self.changelogs {
            let date = entry.date.to_string();
            writer.text("changelog", &[("author", &entry.author), ("date", &date)], &entry.text)?;
        }
        Ok(())
    }

    fn read_body(header: RecordHeader, element: &Element) -> Result<Self> {
        let changelogs = element
            .children_named("changelog")
            .map(|entry| -> Result<ChangelogEntry> {
                Ok(ChangelogEntry {
                    author: entry.required_attr("author")?.to_string(),
                    date: entry.number_attr("date")?,
                    text: entry.text.clone(),
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self { header, changelogs })
    }
}
