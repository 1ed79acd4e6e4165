//! Streaming parse of one CDM file into raw nodes.
//!
//! Output nodes use file-local arena indices (the root is index 0); the
//! loader shifts them when merging files into one graph. Edges are left
//! `Pending`.
//!
//! Element classification:
//!
//! | element                                   | becomes                      |
//! |-------------------------------------------|------------------------------|
//! | has `xmi:id`                              | node                         |
//! | has `href`, tag is a containment feature  | containment proxy            |
//! | has `href`, any other tag                 | element reference            |
//! | no attributes, text (or nothing) inside   | element-style attribute      |
//! | anything else                             | `FormatError`                |
//!
//! Only the reference-valued attribute roles of the schema table are split
//! into references; every other attribute stays text.

use crate::error::FormatError;
use crate::graph::{
    Attribute, AttributeStyle, Containment, ContainmentProxy, EdgeTarget, FileId, Node, NodeId,
    Reference, ReferenceSpelling,
};
use crate::schema::{
    self, ATTR_HREF, ATTR_XMI_ID, ATTR_XMI_VERSION, ATTR_XSI_TYPE, ECORE_NAMESPACE,
    EMF_BINARY_SIGNATURE, XMI_NAMESPACE,
};
use cdm_uuid::{Uuid, UuidKind};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug)]
pub(crate) struct ParsedFile {
    pub name: String,
    pub xmi_version: Option<String>,
    pub namespaces: Vec<(String, String)>,
    /// Document order; index 0 is the root.
    pub nodes: Vec<Node>,
}

/// Open element on the parser stack.
enum Frame {
    Node(usize),
    /// Element-style attribute of the node at `owner`.
    TextField {
        owner: usize,
        tag: String,
        text: String,
    },
    /// `href` element; content is ignored but must not contain elements.
    Link { tag: String },
}

struct RawElement {
    tag: String,
    attributes: Vec<(String, String)>,
}

impl RawElement {
    fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

struct FileParser<'a> {
    file: &'a str,
    nodes: Vec<Node>,
    stack: Vec<Frame>,
    xmi_version: Option<String>,
    namespaces: Vec<(String, String)>,
    seen_root: bool,
}

pub(crate) fn parse_file(name: &str, bytes: &[u8]) -> Result<ParsedFile, FormatError> {
    if bytes.starts_with(&EMF_BINARY_SIGNATURE[..4]) {
        return Err(FormatError::Foreign {
            file: name.to_string(),
            format: "an EMF binary resource".to_string(),
        });
    }
    let text = std::str::from_utf8(bytes).map_err(|_| FormatError::NotUtf8 {
        file: name.to_string(),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut parser = FileParser {
        file: name,
        nodes: Vec::new(),
        stack: Vec::new(),
        xmi_version: None,
        namespaces: Vec::new(),
        seen_root: false,
    };

    let mut reader = Reader::from_str(text);
    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| FormatError::Malformed {
            file: name.to_string(),
            position,
            message: e.to_string(),
        })?;
        match event {
            Event::Start(start) => {
                let element = parser.raw_element(&start, position)?;
                parser.open(element, false)?;
            }
            Event::Empty(start) => {
                let element = parser.raw_element(&start, position)?;
                parser.open(element, true)?;
            }
            Event::End(_) => parser.close(),
            Event::Text(t) => {
                let content = t.unescape().map_err(|e| parser.malformed(position, e))?;
                parser.text(&content)?;
            }
            Event::CData(c) => {
                let content = String::from_utf8_lossy(&c.into_inner()).into_owned();
                parser.text(&content)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !parser.seen_root {
        return Err(FormatError::Empty {
            file: name.to_string(),
        });
    }

    Ok(ParsedFile {
        name: name.to_string(),
        xmi_version: parser.xmi_version,
        namespaces: parser.namespaces,
        nodes: parser.nodes,
    })
}

impl<'a> FileParser<'a> {
    fn malformed(&self, position: usize, e: impl ToString) -> FormatError {
        FormatError::Malformed {
            file: self.file.to_string(),
            position,
            message: e.to_string(),
        }
    }

    fn unexpected(&self, tag: &str) -> FormatError {
        FormatError::UnexpectedContent {
            file: self.file.to_string(),
            tag: tag.to_string(),
        }
    }

    fn raw_element(
        &self,
        start: &BytesStart<'_>,
        position: usize,
    ) -> Result<RawElement, FormatError> {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.malformed(position, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| self.malformed(position, e))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(RawElement { tag, attributes })
    }

    fn current_node(&self) -> Option<usize> {
        match self.stack.last() {
            Some(Frame::Node(idx)) => Some(*idx),
            _ => None,
        }
    }

    fn open(&mut self, element: RawElement, empty: bool) -> Result<(), FormatError> {
        if !self.seen_root {
            self.seen_root = true;
            self.open_root(element, empty)?;
            return Ok(());
        }

        let Some(owner) = self.current_node() else {
            let tag = match self.stack.last() {
                Some(Frame::TextField { tag, .. }) | Some(Frame::Link { tag }) => tag.clone(),
                _ => element.tag.clone(),
            };
            return Err(self.unexpected(&tag));
        };

        if element.get(ATTR_XMI_ID).is_some() {
            let idx = self.push_node(element, Some(owner))?;
            self.nodes[owner]
                .containments
                .push(Containment::Inline(NodeId::new(idx as u32)));
            if !empty {
                self.stack.push(Frame::Node(idx));
            }
            return Ok(());
        }

        if let Some(href) = element.get(ATTR_HREF) {
            let target = self.parse_href(&element.tag, href)?;
            let declared_type = element.get(ATTR_XSI_TYPE).map(str::to_string);
            if schema::is_containment_feature(&element.tag) {
                self.nodes[owner]
                    .containments
                    .push(Containment::Proxy(ContainmentProxy {
                        tag: element.tag.clone(),
                        declared_type,
                        target,
                    }));
            } else {
                self.nodes[owner].references.push(Reference {
                    role: element.tag.clone(),
                    target,
                    spelling: ReferenceSpelling::Element { declared_type },
                });
            }
            if !empty {
                self.stack.push(Frame::Link { tag: element.tag });
            }
            return Ok(());
        }

        if !element.attributes.is_empty() {
            return Err(FormatError::MissingIdentifier {
                file: self.file.to_string(),
                tag: element.tag,
            });
        }

        if empty {
            self.nodes[owner].attributes.push(Attribute {
                name: element.tag,
                value: String::new(),
                style: AttributeStyle::Element,
            });
        } else {
            self.stack.push(Frame::TextField {
                owner,
                tag: element.tag,
                text: String::new(),
            });
        }
        Ok(())
    }

    fn open_root(&mut self, mut element: RawElement, empty: bool) -> Result<(), FormatError> {
        let mut has_xmi = false;
        let mut is_ecore = element.tag.starts_with("ecore:");
        let mut kept = Vec::with_capacity(element.attributes.len());
        for (key, value) in std::mem::take(&mut element.attributes) {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                has_xmi |= value == XMI_NAMESPACE;
                is_ecore &= value == ECORE_NAMESPACE || prefix != "ecore";
                self.namespaces.push((prefix.to_string(), value));
            } else if key == ATTR_XMI_VERSION {
                self.xmi_version = Some(value);
            } else {
                kept.push((key, value));
            }
        }
        element.attributes = kept;

        if is_ecore {
            return Err(FormatError::Foreign {
                file: self.file.to_string(),
                format: "an Ecore metamodel".to_string(),
            });
        }
        if !has_xmi {
            return Err(FormatError::Foreign {
                file: self.file.to_string(),
                format: "plain XML without the XMI namespace".to_string(),
            });
        }
        if element.get(ATTR_XMI_ID).is_none() {
            return Err(FormatError::MissingIdentifier {
                file: self.file.to_string(),
                tag: element.tag,
            });
        }

        let idx = self.push_node(element, None)?;
        if !empty {
            self.stack.push(Frame::Node(idx));
        }
        Ok(())
    }

    fn push_node(&mut self, element: RawElement, owner: Option<usize>) -> Result<usize, FormatError> {
        let RawElement { tag, attributes } = element;
        let mut id: Option<Uuid> = None;
        let mut explicit_type: Option<String> = None;
        let mut node_attributes = Vec::new();
        let mut references = Vec::new();

        for (key, value) in attributes {
            match key.as_str() {
                ATTR_XMI_ID => {
                    let uuid = cdm_uuid::parse(&value).map_err(|source| {
                        FormatError::InvalidIdentifier {
                            file: self.file.to_string(),
                            tag: tag.clone(),
                            source,
                        }
                    })?;
                    id = Some(uuid);
                }
                ATTR_XSI_TYPE => explicit_type = Some(value),
                _ => {
                    let targets = if schema::is_reference_attribute(&key) {
                        reference_tokens(&value)
                    } else {
                        None
                    };
                    match targets {
                        Some(targets) => {
                            references.extend(targets.into_iter().map(|target| Reference {
                                role: key.clone(),
                                target,
                                spelling: ReferenceSpelling::Attribute,
                            }));
                        }
                        None => node_attributes.push(Attribute::inline(key, value)),
                    }
                }
            }
        }

        let Some(id) = id else {
            return Err(FormatError::MissingIdentifier {
                file: self.file.to_string(),
                tag,
            });
        };

        let declared_type = explicit_type.or_else(|| match owner {
            None => Some(tag.clone()),
            Some(_) => schema::default_type_for_tag(&tag).map(str::to_string),
        });

        let mut node = Node::new(id, tag, FileId::new(0));
        node.declared_type = declared_type;
        node.attributes = node_attributes;
        node.references = references;
        node.parent = owner.map(|o| NodeId::new(o as u32));

        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    fn parse_href(&self, tag: &str, href: &str) -> Result<EdgeTarget, FormatError> {
        parse_href_token(href).ok_or_else(|| FormatError::InvalidHref {
            file: self.file.to_string(),
            tag: tag.to_string(),
            href: href.to_string(),
        })
    }

    fn text(&mut self, content: &str) -> Result<(), FormatError> {
        match self.stack.last_mut() {
            Some(Frame::TextField { text, .. }) => {
                text.push_str(content);
                Ok(())
            }
            _ if content.trim().is_empty() => Ok(()),
            Some(Frame::Node(idx)) => {
                let tag = self.nodes[*idx].tag.clone();
                Err(self.unexpected(&tag))
            }
            Some(Frame::Link { tag }) => {
                let tag = tag.clone();
                Err(self.unexpected(&tag))
            }
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        if let Some(Frame::TextField { owner, tag, text }) = self.stack.pop() {
            self.nodes[owner].attributes.push(Attribute {
                name: tag,
                value: text,
                style: AttributeStyle::Element,
            });
        }
    }
}

/// `file#_compact` or `#_compact` or `_compact`.
fn parse_href_token(token: &str) -> Option<EdgeTarget> {
    let (file, fragment) = match token.rsplit_once('#') {
        Some((file, fragment)) => (Some(file), fragment),
        None => (None, token),
    };
    if cdm_uuid::detect_kind(fragment) != UuidKind::Compact {
        return None;
    }
    let uuid = cdm_uuid::parse(fragment).ok()?;
    let file_hint = file.filter(|f| !f.is_empty()).map(str::to_string);
    Some(EdgeTarget::new(uuid, file_hint))
}

/// Targets of a reference-valued attribute: every whitespace-separated token
/// must be a compact UUID, optionally behind a file name.
fn reference_tokens(value: &str) -> Option<Vec<EdgeTarget>> {
    let mut targets = Vec::new();
    for token in value.split_whitespace() {
        targets.push(parse_href_token(token)?);
    }
    if targets.is_empty() {
        None
    } else {
        Some(targets)
    }
}
