//! Minimal XML element tree built on `quick-xml`.
//!
//! Coverage documents are small enough to hold in memory, and the merge
//! walks them top-down (`coverage` → `project` → `package` → `file` →
//! `class`/`line`), so every input is first materialised as an [`Element`]
//! tree. The merged report is built as the same tree type and written back
//! out with [`write_document`].
use std::borrow::Cow;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;

use crate::error::{CloverMergeError, Result};

/// Insertion-ordered attribute bag. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Set `key`, replacing the value in place if the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }

    /// Add every entry of `other` whose key is absent here. Existing values win.
    pub fn fill_missing(&mut self, other: &Attributes) {
        for (key, value) in other.iter() {
            if !self.contains_key(key) {
                self.0.push((key.to_string(), value.to_string()));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// The element kinds the merge understands. Anything else is `Other` and is
/// skipped with a warning by whoever encounters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Coverage,
    Project,
    Package,
    File,
    Class,
    Line,
    Metrics,
    Other,
}

impl ElementKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "coverage" => ElementKind::Coverage,
            "project" => ElementKind::Project,
            "package" => ElementKind::Package,
            "file" => ElementKind::File,
            "class" => ElementKind::Class,
            "line" => ElementKind::Line,
            "metrics" => ElementKind::Metrics,
            _ => ElementKind::Other,
        }
    }
}

/// An XML element with its attributes and child elements. Text content is
/// not retained; Clover carries everything in attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Attributes,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn kind(&self) -> ElementKind {
        ElementKind::from_name(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }
}

fn xml_err<R>(e: quick_xml::Error, reader: &Reader<R>) -> CloverMergeError {
    CloverMergeError::Xml {
        source: e,
        position: reader.buffer_position(),
    }
}

fn element_from<R>(start: &BytesStart<'_>, reader: &Reader<R>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_err(e.into(), reader))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| xml_err(e, reader))?;
        element.attributes.insert(key, value.into_owned());
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(CloverMergeError::Parse(format!(
            "unexpected second root element <{}>",
            element.name
        )));
    } else {
        *root = Some(element);
    }
    Ok(())
}

/// Parse a complete XML document and return its root element.
///
/// Any syntax error, unclosed element or missing root is an error: a
/// document that cannot be read as a tree is unusable for merging.
pub fn parse_document(input: &[u8]) -> Result<Element> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) => {
                let element = element_from(e, &reader)?;
                stack.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from(e, &reader)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or_else(|| {
                    CloverMergeError::Parse("unexpected closing tag".to_string())
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(CloverMergeError::Parse(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }

    root.ok_or_else(|| CloverMergeError::Parse("document has no root element".to_string()))
}

/// Read and parse the document at `path`.
pub fn load(path: &Path) -> Result<Element> {
    let content = std::fs::read(path)?;
    parse_document(&content)
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| CloverMergeError::Parse(format!("failed to serialise XML: {e}")))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(Cow::Borrowed(element.name.as_str()));
    for (key, value) in element.attributes.iter() {
        start.push_attribute((key, value));
    }

    if element.children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }

    write_event(writer, Event::Start(start))?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    write_event(
        writer,
        Event::End(BytesEnd::new(Cow::Borrowed(element.name.as_str()))),
    )
}

/// Serialise `root` as a standalone, two-space indented UTF-8 document.
pub fn write_document(root: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write_element(&mut writer, root)?;

    let mut out = String::from_utf8(writer.into_inner())
        .map_err(|e| CloverMergeError::Parse(format!("serialised XML is not UTF-8: {e}")))?;
    out.push('\n');
    Ok(out)
}
