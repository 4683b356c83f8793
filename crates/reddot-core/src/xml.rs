//! Owned XML fragments.
//!
//! RQL replies are small XML documents. Entities keep the subtree that
//! describes them (their *fragment*) and read typed values from its
//! attributes, so we need an owned, cloneable tree rather than a streaming
//! reader. Parsing is done with `quick_xml`'s event reader.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{Error, Result};
use crate::guid::Guid;

/// A node below an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its attributes (in document order) and child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style child appender
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Parse text that must contain exactly one root element.
    pub fn parse(text: &str) -> Result<Self> {
        XmlDocument::parse(text)?
            .into_root()
            .ok_or_else(|| Error::Xml("document has no root element".into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element name without a namespace prefix
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Set an attribute, replacing an existing value or appending a new one.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// The `name` attribute
    pub fn name_attribute(&self) -> Option<&str> {
        self.attribute("name")
    }

    /// The `guid` attribute; absent or empty yields `None`.
    pub fn guid(&self) -> Result<Option<Guid>> {
        self.guid_attribute("guid")
    }

    pub fn guid_attribute(&self, name: &str) -> Result<Option<Guid>> {
        Guid::parse_optional(self.attribute(name))
    }

    /// A guid attribute that must be present
    pub fn required_guid(&self, name: &str) -> Result<Guid> {
        self.guid_attribute(name)?.ok_or_else(|| {
            Error::internal(format!(
                "element <{}> has no '{name}' attribute",
                self.name
            ))
        })
    }

    pub fn int_attribute(&self, name: &str) -> Result<Option<i64>> {
        match self.attribute(name).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| Error::InvalidAttribute {
                    attribute: name.to_string(),
                    value: raw.to_string(),
                    expected: "an integer",
                }),
        }
    }

    /// Booleans are written as `1` / `0`; any other number is an error.
    pub fn bool_attribute(&self, name: &str) -> Result<Option<bool>> {
        match self.int_attribute(name)? {
            None => Ok(None),
            Some(1) => Ok(Some(true)),
            Some(0) => Ok(Some(false)),
            Some(other) => Err(Error::InvalidAttribute {
                attribute: name.to_string(),
                value: other.to_string(),
                expected: "1 or 0",
            }),
        }
    }

    // ========================================================================
    // Children
    // ========================================================================

    pub fn nodes(&self) -> &[XmlNode] {
        &self.children
    }

    /// Direct child elements
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First direct child element named `name`
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children().find(|e| e.name == name)
    }

    /// Follow a path of direct child names
    pub fn path(&self, names: &[&str]) -> Option<&XmlElement> {
        names
            .iter()
            .try_fold(self, |current, name| current.child(name))
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    /// All elements named `name` in this subtree, in document order,
    /// including this element itself when it matches.
    pub fn elements_by_tag_name<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_by_name(name, &mut found);
        found
    }

    fn collect_by_name<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        if self.name == name {
            found.push(self);
        }
        for child in self.children() {
            child.collect_by_name(name, found);
        }
    }

    /// The only element named `name` in this subtree.
    ///
    /// Zero matches is [`Error::NotFound`]; more than one is [`Error::Internal`].
    pub fn single_element(&self, name: &str) -> Result<&XmlElement> {
        let found = self.elements_by_tag_name(name);
        match found.len() {
            1 => Ok(found[0]),
            0 => Err(Error::not_found(format!("no <{name}> element in reply"))),
            n => Err(Error::internal(format!(
                "invalid number of <{name}> elements in reply: expected 1, got {n}"
            ))),
        }
    }

    /// Concatenated text of this subtree
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        let _ = write!(out, "<{}", self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, escape(value.as_str()));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(&escape(t.as_str())),
                XmlNode::Element(e) => e.write_to(out),
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut element = XmlElement::new(name);
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(e.to_string()))?
                .into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

/// A parsed reply. Empty replies are valid and have no root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlDocument {
    root: Option<XmlElement>,
}

impl XmlDocument {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse reply text. Whitespace-only text yields an empty document.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }

        let mut reader = Reader::from_str(text);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(XmlElement::from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    let element = XmlElement::from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.push_text(text.into_owned()),
                        None if text.trim().is_empty() => {}
                        None => return Err(Error::Xml("text outside of root element".into())),
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(text);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {} // declarations, comments, processing instructions
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "at position {}: {e}",
                        reader.buffer_position()
                    )))
                }
            }
        }

        if !stack.is_empty() {
            return Err(Error::Xml("unexpected end of document".into()));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> Option<&XmlElement> {
        self.root.as_ref()
    }

    pub fn into_root(self) -> Option<XmlElement> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// See [`XmlElement::elements_by_tag_name`]
    pub fn elements_by_tag_name<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        self.root
            .as_ref()
            .map(|r| r.elements_by_tag_name(name))
            .unwrap_or_default()
    }

    /// See [`XmlElement::single_element`]
    pub fn single_element(&self, name: &str) -> Result<&XmlElement> {
        match &self.root {
            Some(root) => root.single_element(name),
            None => Err(Error::not_found(format!("no <{name}> element in empty reply"))),
        }
    }

    pub fn inner_text(&self) -> String {
        self.root
            .as_ref()
            .map(XmlElement::inner_text)
            .unwrap_or_default()
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_child(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(Error::Xml("more than one root element".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROJECTS: &str = r#"<IODATA><PROJECTS>
        <PROJECT guid="4E2C3A1F0B8D4D6A9E7F112233445566" name="Intranet &amp; Extranet"/>
        <PROJECT guid="11111111111111111111111111111111" name="Shop" testproject="1"/>
    </PROJECTS></IODATA>"#;

    #[test]
    fn test_parse_attributes_and_descendants() {
        let doc = XmlDocument::parse(PROJECTS).unwrap();
        let projects = doc.elements_by_tag_name("PROJECT");
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name_attribute(), Some("Intranet & Extranet"));
        assert_eq!(projects[1].bool_attribute("testproject").unwrap(), Some(true));
        assert_eq!(
            projects[0].guid().unwrap().unwrap().to_string(),
            "4E2C3A1F0B8D4D6A9E7F112233445566"
        );
    }

    #[test]
    fn test_empty_reply_is_empty_document() {
        let doc = XmlDocument::parse("  \n").unwrap();
        assert!(doc.is_empty());
        assert!(doc.elements_by_tag_name("PROJECT").is_empty());
    }

    #[test]
    fn test_malformed_reply_is_error() {
        assert!(XmlDocument::parse("<IODATA><USER></IODATA>").is_err());
        assert!(XmlDocument::parse("<IODATA>").is_err());
        assert!(XmlDocument::parse("not xml at all").is_err());
    }

    #[test]
    fn test_single_element_counts() {
        let doc = XmlDocument::parse(PROJECTS).unwrap();
        assert!(doc.single_element("PROJECTS").is_ok());
        assert!(matches!(doc.single_element("PROJECT"), Err(Error::Internal(_))));
        assert!(matches!(doc.single_element("USER"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_inner_text_and_path() {
        let root = XmlElement::parse(
            r#"<IODATA><USER guid="x"><LASTMODULES><MODULE last="1" project="p"/></LASTMODULES></USER>ok</IODATA>"#,
        )
        .unwrap();
        assert_eq!(root.inner_text(), "ok");
        let module = root.path(&["USER", "LASTMODULES", "MODULE"]).unwrap();
        assert_eq!(module.attribute("project"), Some("p"));
    }

    #[test]
    fn test_serialization_escapes() {
        let mut element = XmlElement::new("TEMPLATE").with_attribute("description", "a \"b\" <c>");
        element.push_text("x & y");
        assert_eq!(
            element.to_xml_string(),
            r#"<TEMPLATE description="a &quot;b&quot; &lt;c&gt;">x &amp; y</TEMPLATE>"#
        );
        let reparsed = XmlElement::parse(&element.to_xml_string()).unwrap();
        assert_eq!(reparsed, element);
    }

    #[test]
    fn test_set_and_remove_attribute() {
        let mut element = XmlElement::new("USER").with_attribute("name", "a");
        element.set_attribute("name", "b");
        element.set_attribute("email", "b@example.com");
        assert_eq!(element.attribute("name"), Some("b"));
        assert_eq!(element.remove_attribute("email"), Some("b@example.com".into()));
        assert!(!element.has_attribute("email"));
    }

    #[test]
    fn test_bool_attribute_rejects_other_numbers() {
        let element = XmlElement::new("X").with_attribute("flag", "2");
        assert!(element.bool_attribute("flag").is_err());
    }

    #[test]
    fn test_local_name() {
        let element = XmlElement::new("s:Envelope");
        assert_eq!(element.local_name(), "Envelope");
    }
}
