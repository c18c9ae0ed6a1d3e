use super::record::Record;
use super::xml::{Element, XmlWriter};
use crate::error::{ErrorKind, Result, corrupt};
use crate::models::DocumentKind;

const RPM_NAMESPACE: &str = "http://linux.duke.edu/metadata/rpm";

/// Ordered records of one catalog document, unique by location.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog<R> {
    records: Vec<R>,
}

impl<R> Default for Catalog<R> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<R: Record> Catalog<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, location: &str) -> Option<&R> {
        self.records.iter().find(|record| record.location() == location)
    }

    /// Position and record at `location`.
    pub fn entry(&self, location: &str) -> Option<(usize, &R)> {
        self.records.iter().enumerate().find(|(_, record)| record.location() == location)
    }

    fn position(&self, location: &str) -> Option<usize> {
        self.records.iter().position(|record| record.location() == location)
    }

    /// Insert `record`, replacing any record at the same location in place.
    ///
    /// With `collision` set the caller expects a record to replace, and its
    /// absence is a [`CollisionResolution`](ErrorKind::CollisionResolution)
    /// error.
    pub fn upsert(&mut self, record: R, collision: bool) -> Result<()> {
        match (self.position(record.location()), collision) {
            (Some(index), _) => self.records[index] = record,
            (None, false) => self.records.push(record),
            (None, true) => exn::bail!(ErrorKind::CollisionResolution(record.location().to_string())),
        }
        Ok(())
    }

    /// Put `record` back at `index`, or replace the record already at its
    /// location. Indices past the end append.
    pub fn put(&mut self, index: usize, record: R) {
        match self.position(record.location()) {
            Some(existing) => self.records[existing] = record,
            None => self.records.insert(index.min(self.records.len()), record),
        }
    }

    pub fn remove(&mut self, location: &str) -> Option<R> {
        self.position(location).map(|index| self.records.remove(index))
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let kind = R::KIND;
        let count = self.records.len().to_string();
        let mut writer = XmlWriter::new()?;
        match kind {
            DocumentKind::Primary => writer.start(
                kind.root_element(),
                &[("xmlns", kind.namespace()), ("xmlns:rpm", RPM_NAMESPACE), ("packages", &count)],
            )?,
            _ => writer.start(kind.root_element(), &[("xmlns", kind.namespace()), ("packages", &count)])?,
        }
        for record in &self.records {
            record.write(&mut writer)?;
        }
        writer.end(kind.root_element())?;
        Ok(writer.finish())
    }

    /// Parse a document of this kind.
    ///
    /// Records repeating an earlier location replace it, so a document
    /// written by an older, less careful writer still loads with unique
    /// locations.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let root = Element::parse(xml)?;
        if root.name != R::KIND.root_element() {
            exn::bail!(corrupt(format!("expected <{}> document, found <{}>", R::KIND.root_element(), root.name)));
        }
        let mut catalog = Self::new();
        for element in root.children_named("package") {
            catalog.upsert(R::read(element)?, false)?;
        }
        if let Some(declared) = root.attr("packages")
            && declared.parse::<usize>().ok() != Some(catalog.len())
        {
            tracing::warn!(declared, actual = catalog.len(), kind = %R::KIND, "catalog package count mismatch");
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::record::{OthersRecord, PrimaryRecord, RecordHeader};
    use crate::models::{Checksum, Version};

    fn record(location: &str, rel: &str) -> PrimaryRecord {
        PrimaryRecord {
            header: RecordHeader {
                name: "p".into(),
                arch: "noarch".into(),
                version: Version::new(0, "1.0", rel),
                checksum: Checksum::sha256("aa"),
                package_size: 1,
                installed_size: 2,
                archive_size: 3,
                location: location.into(),
            },
            files: Vec::new(),
        }
    }

    #[test]
    fn test_distinct_locations_append() {
        let mut catalog = Catalog::new();
        for location in ["a.rpm", "b.rpm", "c.rpm"] {
            catalog.upsert(record(location, "1"), false).unwrap();
        }
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_existing_location_replaced_in_place() {
        let mut catalog = Catalog::new();
        catalog.upsert(record("a.rpm", "1"), false).unwrap();
        catalog.upsert(record("b.rpm", "1"), false).unwrap();
        catalog.upsert(record("a.rpm", "2"), true).unwrap();
        catalog.upsert(record("b.rpm", "2"), false).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.records()[0].header.version.rel, "2");
        assert_eq!(catalog.records()[0].location(), "a.rpm");
        assert_eq!(catalog.records()[1].header.version.rel, "2");
    }

    #[test]
    fn test_collision_without_record_fails() {
        let mut catalog = Catalog::<PrimaryRecord>::new();
        let err = catalog.upsert(record("a.rpm", "1"), true).unwrap_err();
        assert!(matches!(&*err, ErrorKind::CollisionResolution(location) if location == "a.rpm"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_put_restores_position() {
        let mut catalog = Catalog::new();
        for location in ["a.rpm", "b.rpm", "c.rpm"] {
            catalog.upsert(record(location, "1"), false).unwrap();
        }
        let (index, removed) = catalog.entry("b.rpm").map(|(index, record)| (index, record.clone())).unwrap();
        catalog.remove("b.rpm");
        catalog.put(index, removed);
        let locations: Vec<_> = catalog.records().iter().map(Record::location).collect();
        assert_eq!(locations, ["a.rpm", "b.rpm", "c.rpm"]);

        catalog.put(0, record("c.rpm", "2"));
        assert_eq!(catalog.entry("c.rpm").unwrap().0, 2);
        assert_eq!(catalog.get("c.rpm").unwrap().header.version.rel, "2");
        catalog.put(99, record("d.rpm", "1"));
        assert_eq!(catalog.entry("d.rpm").unwrap().0, 3);
    }

    #[test]
    fn test_remove() {
        let mut catalog = Catalog::new();
        catalog.upsert(record("a.rpm", "1"), false).unwrap();
        catalog.upsert(record("b.rpm", "1"), false).unwrap();
        assert!(catalog.remove("a.rpm").is_some());
        assert!(catalog.remove("a.rpm").is_none());
        assert_eq!(catalog.records(), &[record("b.rpm", "1")]);
    }

    #[test]
    fn test_xml_round_trip() {
        let mut catalog = Catalog::new();
        catalog.upsert(record("x/a.rpm", "1"), false).unwrap();
        catalog.upsert(record("x/b & c.rpm", "1"), false).unwrap();
        let xml = catalog.to_xml().unwrap();
        let text = String::from_utf8(xml.clone()).unwrap();
        assert!(text.contains(r#"packages="2""#));
        assert_eq!(Catalog::from_xml(&xml).unwrap(), catalog);
    }

    #[test]
    fn test_wrong_root_is_corrupt() {
        let xml = Catalog::<PrimaryRecord>::new().to_xml().unwrap();
        let err = Catalog::<OthersRecord>::from_xml(&xml).unwrap_err();
        assert!(matches!(&*err, ErrorKind::CorruptDocument(_)));
    }

    #[test]
    fn test_duplicate_locations_collapse_on_load() {
        let xml = br#"<metadata packages="2">
            <package type="rpm"><name>p</name><arch>noarch</arch><version epoch="0" ver="1" rel="1"/>
              <checksum type="sha256">aa</checksum><size package="1" installed="1" archive="1"/>
              <location href="a.rpm"/></package>
            <package type="rpm"><name>p</name><arch>noarch</arch><version epoch="0" ver="1" rel="2"/>
              <checksum type="sha256">bb</checksum><size package="1" installed="1" archive="1"/>
              <location href="a.rpm"/></package>
        </metadata>"#;
        let catalog = Catalog::<PrimaryRecord>::from_xml(xml).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.records()[0].header.checksum.value, "bb");
    }
}
