//! Namespace-aware XML tree for TRX files.
//!
//! TRX files declare a default namespace on the root element, so every
//! child lookup must be scoped to that namespace. A lookup for `Results`
//! in no namespace simply finds nothing, which is why [`TrxDocument`]
//! exposes the root namespace and [`Element::select`] always takes one.
//!
//! Comments, processing instructions and whitespace-only text are dropped
//! while loading. Elements keep enough information to be written back out
//! as standalone markup with [`Element::outer_xml`].

use std::borrow::Cow;
use std::io::{self, Write};
use std::path::Path;

use quick_xml::Writer;
use quick_xml::encoding::{Decoder, detect_encoding};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use tracing::debug;

use super::{TrxError, TrxResult};

/// A parsed TRX document.
#[derive(Debug, Clone)]
pub struct TrxDocument {
    root: Element,
}

/// An XML element with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written, including any prefix.
    name: String,
    local_name: String,
    namespace: Option<String>,
    /// Attributes in source order, keyed by qualified name.
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Element(Element),
    Text(String),
    CData(String),
}

impl TrxDocument {
    /// Loads and parses a TRX file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`TrxError::FileNotFound`] if the path does not exist and
    /// [`TrxError::Parse`] if the content is not well-formed XML or cannot
    /// be decoded.
    ///
    /// UTF-8 and UTF-16 (either byte order) are accepted, detected from the
    /// byte order mark or the first bytes of the XML declaration.
    pub fn load(path: &Path) -> TrxResult<Self> {
        if !path.exists() {
            return Err(TrxError::FileNotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        decode_source(&bytes)
            .and_then(|content| Self::parse(&content))
            .map_err(|e| match e {
                TrxError::Parse(message) => {
                    TrxError::Parse(format!("{}: {}", path.display(), message))
                }
                other => other,
            })
    }

    /// Parses a TRX document from a string.
    pub fn parse(content: &str) -> TrxResult<Self> {
        let mut reader = NsReader::from_str(content);
        let decoder = reader.decoder();

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (ns, event) = reader
                .read_resolved_event()
                .map_err(|e| TrxError::Parse(e.to_string()))?;

            match event {
                Event::Start(start) => {
                    stack.push(Element::from_start(&start, ns, decoder)?);
                }
                Event::Empty(start) => {
                    let element = Element::from_start(&start, ns, decoder)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| TrxError::Parse("unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| TrxError::Parse(e.to_string()))?;
                    if let Some(parent) = stack.last_mut()
                        && !text.trim().is_empty()
                    {
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        parent.children.push(Node::CData(text));
                    }
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctypes
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(TrxError::Parse(format!(
                "unexpected end of document inside <{}>",
                open.name
            )));
        }

        let root =
            root.ok_or_else(|| TrxError::Parse("document has no root element".to_string()))?;
        debug!(
            "Parsed document root <{}> in namespace {:?}",
            root.name, root.namespace
        );

        Ok(Self { root })
    }

    /// The document element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Namespace of the document element; scopes every lookup below it.
    pub fn namespace(&self) -> Option<&str> {
        self.root.namespace()
    }
}

/// Attach a finished element to its parent, or make it the root.
fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> TrxResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
        return Ok(());
    }

    if root.is_some() {
        return Err(TrxError::Parse(format!(
            "multiple root elements (found <{}>)",
            element.name
        )));
    }

    *root = Some(element);
    Ok(())
}

/// Decode raw file bytes to text, dropping any byte order mark.
fn decode_source(bytes: &[u8]) -> TrxResult<Cow<'_, str>> {
    match detect_encoding(bytes) {
        Some((encoding, bom)) => quick_xml::encoding::decode(&bytes[bom..], encoding)
            .map_err(|e| TrxError::Parse(format!("cannot decode as {}: {}", encoding.name(), e))),
        None => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| TrxError::Parse(e.to_string())),
    }
}

fn decode(bytes: &[u8]) -> TrxResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| TrxError::Parse(e.to_string()))
}

impl Element {
    fn from_start(
        start: &BytesStart<'_>,
        ns: ResolveResult<'_>,
        decoder: Decoder,
    ) -> TrxResult<Self> {
        let name = decode(start.name().as_ref())?;
        let local_name = decode(start.local_name().as_ref())?;

        let namespace = match ns {
            ResolveResult::Bound(Namespace(uri)) => Some(decode(uri)?),
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(TrxError::Parse(format!(
                    "undeclared namespace prefix '{}' on <{}>",
                    String::from_utf8_lossy(&prefix),
                    name
                )));
            }
        };

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| TrxError::Parse(e.to_string()))?;
            let key = decode(attr.key.as_ref())?;
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|e| TrxError::Parse(e.to_string()))?;
            attributes.push((key, value.into_owned()));
        }

        Ok(Self {
            name,
            local_name,
            namespace,
            attributes,
            children: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Look up an attribute by its qualified name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Select descendants along a path of local names, each step matching
    /// only elements in `namespace`.
    ///
    /// `select(&["Results", "UnitTestResult"], ns)` is the equivalent of the
    /// XPath `p:Results/p:UnitTestResult` with `p` bound to `ns`.
    pub fn select<'a>(&'a self, path: &[&str], namespace: Option<&str>) -> Vec<&'a Element> {
        let mut current: Vec<&Element> = vec![self];
        for step in path {
            current = current
                .into_iter()
                .flat_map(|element| element.children())
                .filter(|child| child.local_name == *step && child.namespace() == namespace)
                .collect();
        }
        current
    }

    /// First match of [`Element::select`].
    pub fn select_first<'a>(&'a self, path: &[&str], namespace: Option<&str>) -> Option<&'a Element> {
        self.select(path, namespace).into_iter().next()
    }

    /// Concatenated text of this element and all its descendants.
    pub fn inner_text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Element(element) => element.collect_text(out),
                Node::Text(text) | Node::CData(text) => out.push_str(text),
            }
        }
    }

    /// Serialize this element and its subtree as standalone markup.
    ///
    /// The element's namespace is declared on the fragment root unless the
    /// element already declares it, so the fragment keeps its meaning when
    /// lifted out of the document.
    pub fn outer_xml(&self) -> TrxResult<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer, None)
            .map_err(|e| TrxError::Serialize(e.to_string()))?;
        String::from_utf8(writer.into_inner()).map_err(|e| TrxError::Serialize(e.to_string()))
    }

    fn write_to<W: Write>(
        &self,
        writer: &mut Writer<W>,
        inherited: Option<&str>,
    ) -> io::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if let Some(uri) = self.namespace()
            && inherited != Some(uri)
        {
            let declaration = self.namespace_declaration();
            if self.attribute(&declaration).is_none() {
                start.push_attribute((declaration.as_str(), uri));
            }
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for node in &self.children {
            match node {
                Node::Element(child) => child.write_to(writer, self.namespace())?,
                Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
                Node::CData(text) => writer.write_event(Event::CData(BytesCData::new(text)))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;

        Ok(())
    }

    /// `xmlns` or `xmlns:prefix`, matching how this element names itself.
    fn namespace_declaration(&self) -> String {
        match self.name.split_once(':') {
            Some((prefix, _)) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        }
    }
}
