//! Catalog document model and codec.
//!
//! [`Catalog<R>`] holds the typed records of one document kind;
//! [`CatalogDocument`] picks the record type at run time from a
//! [`DocumentKind`]. Encoding produces the compressed bytes together with
//! the [`DocumentStats`] advertised for them.

mod catalog;
mod record;
mod xml;

pub use self::catalog::Catalog;
pub use self::record::{FileListsRecord, OthersRecord, PrimaryRecord, Record, RecordHeader};
pub(crate) use self::xml::{Element, XmlWriter};
use crate::error::{ErrorKind, Result, corrupt};
use crate::models::{DocumentKind, DocumentStats, PackageMetadata, PackageReference};
use exn::ResultExt;
use repomd_compress::Compression;
use repomd_storage::sha256_hex;
use std::io::Read;
use time::UtcDateTime;

/// A catalog document of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogDocument {
    Primary(Catalog<PrimaryRecord>),
    FileLists(Catalog<FileListsRecord>),
    Others(Catalog<OthersRecord>),
}

macro_rules! each_kind {
    ($document:expr, $catalog:ident => $body:expr) => {
        match $document {
            CatalogDocument::Primary($catalog) => $body,
            CatalogDocument::FileLists($catalog) => $body,
            CatalogDocument::Others($catalog) => $body,
        }
    };
}

impl CatalogDocument {
    pub fn empty(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Primary => Self::Primary(Catalog::new()),
            DocumentKind::FileLists => Self::FileLists(Catalog::new()),
            DocumentKind::Others => Self::Others(Catalog::new()),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Primary(_) => DocumentKind::Primary,
            Self::FileLists(_) => DocumentKind::FileLists,
            Self::Others(_) => DocumentKind::Others,
        }
    }

    pub fn len(&self) -> usize {
        each_kind!(self, catalog => catalog.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Header of the record at `location`, if any.
    pub fn header(&self, location: &str) -> Option<&RecordHeader> {
        each_kind!(self, catalog => catalog.get(location).map(Record::header))
    }

    pub fn locations(&self) -> Vec<&str> {
        each_kind!(self, catalog => catalog.records().iter().map(Record::location).collect())
    }

    /// Merge the record `package` contributes to this kind of document.
    pub fn upsert(&mut self, package: &PackageMetadata, reference: &PackageReference, collision: bool) -> Result<()> {
        let header = RecordHeader::new(package, reference);
        each_kind!(self, catalog => catalog.upsert(Record::from_package(header, package), collision))
    }

    /// Position and copy of the record at `location`.
    pub fn record(&self, location: &str) -> Option<(usize, AnyRecord)> {
        match self {
            Self::Primary(catalog) => catalog.entry(location).map(|(i, r)| (i, AnyRecord::Primary(r.clone()))),
            Self::FileLists(catalog) => catalog.entry(location).map(|(i, r)| (i, AnyRecord::FileLists(r.clone()))),
            Self::Others(catalog) => catalog.entry(location).map(|(i, r)| (i, AnyRecord::Others(r.clone()))),
        }
    }

    /// Bring `location` back to `previous`, as returned by [`record`](Self::record).
    ///
    /// `None` removes whatever record is at the location.
    pub fn restore(&mut self, location: &str, previous: Option<&(usize, AnyRecord)>) -> Result<()> {
        match (self, previous) {
            (document, None) => {
                document.remove(location);
            },
            (Self::Primary(catalog), Some((index, AnyRecord::Primary(record)))) => catalog.put(*index, record.clone()),
            (Self::FileLists(catalog), Some((index, AnyRecord::FileLists(record)))) => {
                catalog.put(*index, record.clone())
            },
            (Self::Others(catalog), Some((index, AnyRecord::Others(record)))) => catalog.put(*index, record.clone()),
            (document, Some((_, record))) => {
                exn::bail!(corrupt(format!("cannot restore a {} record into a {} document", record.kind(), document.kind())))
            },
        }
        Ok(())
    }

    /// Remove the record at `location`, returning whether there was one.
    pub fn remove(&mut self, location: &str) -> bool {
        each_kind!(self, catalog => catalog.remove(location).is_some())
    }

    pub fn from_xml(kind: DocumentKind, xml: &[u8]) -> Result<Self> {
        Ok(match kind {
            DocumentKind::Primary => Self::Primary(Catalog::from_xml(xml)?),
            DocumentKind::FileLists => Self::FileLists(Catalog::from_xml(xml)?),
            DocumentKind::Others => Self::Others(Catalog::from_xml(xml)?),
        })
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        each_kind!(self, catalog => catalog.to_xml())
    }

    /// Decompress and parse a stored document.
    pub fn decode(kind: DocumentKind, compression: Compression, reader: impl Read) -> Result<Self> {
        let xml = compression
            .decompress_reader(reader)
            .or_raise(|| ErrorKind::CorruptDocument(format!("{kind} document does not decompress as {compression}")))?;
        Self::from_xml(kind, &xml)
    }

    /// Serialise and compress the document.
    pub fn encode(&self, compression: Compression) -> Result<EncodedDocument> {
        let xml = self.to_xml()?;
        let bytes = compression
            .compress(&xml)
            .or_raise(|| ErrorKind::CorruptDocument(format!("could not compress {} document", self.kind())))?;
        let stats = DocumentStats {
            checksum: sha256_hex(&bytes),
            size: bytes.len() as u64,
            timestamp: UtcDateTime::now().unix_timestamp(),
            open_checksum: Some(sha256_hex(&xml)),
            open_size: Some(xml.len() as u64),
        };
        Ok(EncodedDocument { kind: self.kind(), compression, records: self.len(), bytes, stats })
    }
}

/// A single record of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyRecord {
    Primary(PrimaryRecord),
    FileLists(FileListsRecord),
    Others(OthersRecord),
}

impl AnyRecord {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Primary(_) => DocumentKind::Primary,
            Self::FileLists(_) => DocumentKind::FileLists,
            Self::Others(_) => DocumentKind::Others,
        }
    }

    pub fn header(&self) -> &RecordHeader {
        match self {
            Self::Primary(record) => record.header(),
            Self::FileLists(record) => record.header(),
            Self::Others(record) => record.header(),
        }
    }
}

/// A serialised, compressed catalog document ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    pub kind: DocumentKind,
    pub compression: Compression,
    pub records: usize,
    pub bytes: Vec<u8>,
    pub stats: DocumentStats,
}
impl EncodedDocument {
    /// Content-addressed file name of the document inside `repodata`.
    pub fn file_name(&self) -> String {
        self.kind.file_name(&self.stats.checksum, self.compression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Checksum, FileEntry, FileKind, IndexRoot, RepoKey, Version};
    use std::io::Cursor;

    fn package(name: &str) -> PackageMetadata {
        PackageMetadata {
            name: name.into(),
            arch: "noarch".into(),
            version: Version::new(0, "1", "1"),
            checksum: Checksum::sha256("aa"),
            files: vec![FileEntry::new("/usr/bin/x", FileKind::File)],
            ..Default::default()
        }
    }

    fn reference(location: &str) -> PackageReference {
        PackageReference {
            root: IndexRoot::new(RepoKey::new("p", "r"), ""),
            location: location.into(),
            content_hash: "00".into(),
            size: 1,
        }
    }

    #[test]
    fn test_encode_decode() {
        for kind in DocumentKind::ALL {
            let mut document = CatalogDocument::empty(kind);
            document.upsert(&package("a"), &reference("a.rpm"), false).unwrap();
            document.upsert(&package("b"), &reference("b.rpm"), false).unwrap();
            let encoded = document.encode(Compression::Gzip).unwrap();
            assert_eq!(encoded.records, 2);
            assert_eq!(encoded.stats.size, encoded.bytes.len() as u64);
            assert_eq!(encoded.file_name(), format!("{}-{kind}.xml.gz", encoded.stats.checksum));
            let decoded = CatalogDocument::decode(kind, Compression::Gzip, Cursor::new(encoded.bytes)).unwrap();
            assert_eq!(decoded, document);
            assert_eq!(decoded.locations(), vec!["a.rpm", "b.rpm"]);
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let mut document = CatalogDocument::empty(DocumentKind::Primary);
        document.upsert(&package("a"), &reference("a.rpm"), false).unwrap();
        let first = document.encode(Compression::Gzip).unwrap();
        let second = document.encode(Compression::Gzip).unwrap();
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.stats.checksum, second.stats.checksum);
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let err = CatalogDocument::decode(DocumentKind::Primary, Compression::Gzip, Cursor::new(b"not gzip".to_vec()))
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::CorruptDocument(_)));
    }

    #[test]
    fn test_restore() {
        let mut document = CatalogDocument::empty(DocumentKind::Primary);
        for name in ["a", "b", "c"] {
            document.upsert(&package(name), &reference(&format!("{name}.rpm")), false).unwrap();
        }
        let before = document.clone();
        let previous = document.record("b.rpm").unwrap();
        assert_eq!(previous.0, 1);
        assert_eq!(previous.1.header().name, "b");

        document.remove("b.rpm");
        document.restore("b.rpm", Some(&previous)).unwrap();
        assert_eq!(document, before);

        document.restore("b.rpm", None).unwrap();
        assert_eq!(document.locations(), vec!["a.rpm", "c.rpm"]);
    }

    #[test]
    fn test_restore_other_kind_is_corrupt() {
        let mut others = CatalogDocument::empty(DocumentKind::Others);
        others.upsert(&package("a"), &reference("a.rpm"), false).unwrap();
        let previous = others.record("a.rpm").unwrap();
        let mut primary = CatalogDocument::empty(DocumentKind::Primary);
        let err = primary.restore("a.rpm", Some(&previous)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::CorruptDocument(_)));
        assert!(primary.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut document = CatalogDocument::empty(DocumentKind::Others);
        document.upsert(&package("a"), &reference("a.rpm"), false).unwrap();
        assert!(document.header("a.rpm").is_some());
        assert!(document.remove("a.rpm"));
        assert!(!document.remove("a.rpm"));
        assert!(document.is_empty());
    }
}
