//! Minimal XML plumbing over `quick-xml` events.
//!
//! Catalog documents are small trees of known shape, so reading builds a
//! light [`Element`] tree and writing goes through [`XmlWriter`], which keeps
//! the indentation and escaping rules in one place.

use crate::error::{ErrorKind, Result, corrupt};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// A parsed XML element. Namespace prefixes are dropped from names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parse a complete document and return its root element.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event().map_err(corrupt)? {
                Event::Start(start) => stack.push(Self::open(&start)?),
                Event::Empty(start) => {
                    let element = Self::open(&start)?;
                    Self::close(&mut stack, &mut root, element)?;
                },
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| corrupt("unbalanced closing tag"))?;
                    Self::close(&mut stack, &mut root, element)?;
                },
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape().map_err(corrupt)?);
                    }
                },
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                },
                Event::Eof => break,
                _ => {},
            }
        }
        if !stack.is_empty() {
            exn::bail!(corrupt("unexpected end of document"));
        }
        Ok(root.ok_or_else(|| corrupt("document has no root element"))?)
    }

    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let mut element = Self { name: local(start.local_name().as_ref())?, ..Self::default() };
        for attribute in start.attributes() {
            let attribute = attribute.map_err(corrupt)?;
            let key = local(attribute.key.local_name().as_ref())?;
            let value = attribute.unescape_value().map_err(corrupt)?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn close(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => exn::bail!(corrupt("more than one root element")),
        }
        Ok(())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn required_attr(&self, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| exn::Exn::from(self.missing(&format!("@{name}"))))
    }

    /// Parse a numeric attribute.
    pub fn number_attr<T: std::str::FromStr>(&self, name: &str) -> Result<T> {
        self.required_attr(name)?.parse().map_err(|_| exn::Exn::from(corrupt(format!("<{}> @{name} is not a number", self.name))))
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn required_child(&self, name: &str) -> Result<&Element> {
        self.child(name).ok_or_else(|| exn::Exn::from(self.missing(name)))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text of a required child element.
    pub fn child_text(&self, name: &str) -> Result<&str> {
        Ok(&self.required_child(name)?.text)
    }

    fn missing(&self, what: &str) -> ErrorKind {
        corrupt(format!("<{}> is missing {what}", self.name))
    }
}

fn local(name: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(name).map_err(corrupt)?.to_string())
}

/// Indenting XML writer over an in-memory buffer.
pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self> {
        let mut writer = Self { inner: Writer::new_with_indent(Vec::new(), b' ', 2) };
        writer.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(writer)
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.inner.write_event(event).map_err(|e| exn::Exn::from(corrupt(e)))
    }

    fn element<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        start
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.write(Event::Start(Self::element(name, attributes)))
    }

    pub fn end(&mut self, name: &str) -> Result<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// A self-closing element.
    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.write(Event::Empty(Self::element(name, attributes)))
    }

    /// An element holding only (escaped) text.
    pub fn text(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> Result<()> {
        self.start(name, attributes)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub fn finish(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let xml = br#"<?xml version="1.0"?>
            <metadata xmlns="urn:x" xmlns:rpm="urn:rpm" packages="1">
              <package type="rpm">
                <name>p &amp; q</name>
                <rpm:file type="dir">/etc</rpm:file>
                <empty/>
              </package>
            </metadata>"#;
        let root = Element::parse(xml).unwrap();
        assert_eq!(root.name, "metadata");
        assert_eq!(root.attr("packages"), Some("1"));
        let package = root.required_child("package").unwrap();
        assert_eq!(package.child_text("name").unwrap(), "p & q");
        let file = package.required_child("file").unwrap();
        assert_eq!(file.attr("type"), Some("dir"));
        assert_eq!(file.text, "/etc");
        assert!(package.child("empty").is_some());
    }

    #[test]
    fn test_parse_rejects_broken_documents() {
        assert!(Element::parse(b"<a><b></a>").is_err());
        assert!(Element::parse(b"<a>").is_err());
        assert!(Element::parse(b"").is_err());
        assert!(Element::parse(b"<a/><b/>").is_err());
    }

    #[test]
    fn test_writer_escapes_and_reparses() {
        let mut writer = XmlWriter::new().unwrap();
        writer.start("root", &[("n", "1")]).unwrap();
        writer.text("entry", &[("author", "A <a@b>")], "fixed \"x\" & y").unwrap();
        writer.empty("leaf", &[("href", "a b/c.rpm")]).unwrap();
        writer.end("root").unwrap();
        let xml = writer.finish();
        let root = Element::parse(&xml).unwrap();
        let entry = root.required_child("entry").unwrap();
        assert_eq!(entry.attr("author"), Some("A <a@b>"));
        assert_eq!(entry.text, "fixed \"x\" & y");
        assert_eq!(root.required_child("leaf").unwrap().attr("href"), Some("a b/c.rpm"));
    }

    #[test]
    fn test_missing_child_is_corrupt() {
        let root = Element::parse(b"<a/>").unwrap();
        let err = root.required_child("b").unwrap_err();
        assert!(matches!(&*err, ErrorKind::CorruptDocument(_)));
    }
}
