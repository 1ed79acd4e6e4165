//! Writing the graph back to XMI text.
//!
//! Output is a pure function of the graph and the config: files are written
//! in graph order, attributes in stored order, and children grouped as
//! containments, then element references, then text-valued attributes.

use crate::config::EngineConfig;
use crate::dir::{CdmDirectory, ProgressSink, ProgressStage};
use crate::error::IoError;
use crate::graph::{AttributeStyle, CdmFile, Containment, ModelGraph, Node, NodeId, ReferenceSpelling};
use crate::schema::{self, ATTR_HREF, ATTR_XMI_ID, ATTR_XMI_VERSION, ATTR_XSI_TYPE};
use quick_xml::escape::escape;
use std::fmt::Write as _;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Escape for a double-quoted attribute value. Whitespace control characters
/// become character references so they survive attribute normalization.
fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\n', "&#xA;")
        .replace('\r', "&#xD;")
        .replace('\t', "&#x9;")
}

struct FileWriter<'a> {
    graph: &'a ModelGraph,
    config: &'a EngineConfig,
    out: String,
}

impl<'a> FileWriter<'a> {
    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(&self.config.indent);
        }
    }

    fn attr(&mut self, name: &str, value: &str) {
        let _ = write!(self.out, " {name}=\"{}\"", escape_attribute(value));
    }

    fn write_root(&mut self, file: &CdmFile) {
        self.out.push_str(XML_DECLARATION);
        self.out.push('\n');
        self.write_node(file.root, 0, Some(file));
    }

    fn write_node(&mut self, id: NodeId, depth: usize, root_of: Option<&CdmFile>) {
        let graph = self.graph;
        let Some(node) = graph.node(id) else {
            return;
        };
        self.indent(depth);
        let _ = write!(self.out, "<{}", node.tag);

        if let Some(file) = root_of {
            let xmi_version = file
                .xmi_version
                .clone()
                .unwrap_or_else(|| self.config.xmi_version.clone());
            self.attr(ATTR_XMI_VERSION, &xmi_version);
            for (prefix, uri) in &file.namespaces {
                self.attr(&format!("xmlns:{prefix}"), uri);
            }
        }
        self.attr(ATTR_XMI_ID, &node.compact_id());
        if let Some(declared_type) = explicit_type(node, root_of.is_some()) {
            self.attr(ATTR_XSI_TYPE, declared_type);
        }
        for attribute in &node.attributes {
            if attribute.style == AttributeStyle::Inline {
                self.attr(&attribute.name, &attribute.value);
            }
        }
        for (role, tokens) in attribute_references(node) {
            self.attr(role, &tokens.join(" "));
        }

        let has_children = !node.containments.is_empty()
            || node
                .references
                .iter()
                .any(|r| matches!(r.spelling, ReferenceSpelling::Element { .. }))
            || node
                .attributes
                .iter()
                .any(|a| a.style == AttributeStyle::Element);
        if !has_children {
            self.out.push_str("/>\n");
            return;
        }
        self.out.push_str(">\n");

        for containment in &node.containments {
            match containment {
                Containment::Inline(child) => self.write_node(*child, depth + 1, None),
                Containment::Proxy(proxy) => {
                    self.indent(depth + 1);
                    let _ = write!(self.out, "<{}", proxy.tag);
                    if let Some(declared_type) = &proxy.declared_type {
                        self.attr(ATTR_XSI_TYPE, declared_type);
                    }
                    self.attr(ATTR_HREF, &proxy.target.href());
                    self.out.push_str("/>\n");
                }
            }
        }
        for reference in &node.references {
            if let ReferenceSpelling::Element { declared_type } = &reference.spelling {
                self.indent(depth + 1);
                let _ = write!(self.out, "<{}", reference.role);
                if let Some(declared_type) = declared_type {
                    self.attr(ATTR_XSI_TYPE, declared_type);
                }
                self.attr(ATTR_HREF, &reference.target.href());
                self.out.push_str("/>\n");
            }
        }
        for attribute in &node.attributes {
            if attribute.style == AttributeStyle::Element {
                self.indent(depth + 1);
                if attribute.value.is_empty() {
                    let _ = writeln!(self.out, "<{}/>", attribute.name);
                } else {
                    let _ = writeln!(
                        self.out,
                        "<{name}>{}</{name}>",
                        escape(attribute.value.as_str()),
                        name = attribute.name
                    );
                }
            }
        }

        self.indent(depth);
        let _ = writeln!(self.out, "</{}>", node.tag);
    }
}

/// `xsi:type` to write: only when it differs from what the tag implies.
fn explicit_type(node: &Node, is_root: bool) -> Option<&str> {
    let declared_type = node.declared_type.as_deref()?;
    let implied = if is_root {
        Some(node.tag.as_str())
    } else {
        schema::default_type_for_tag(&node.tag)
    };
    (implied != Some(declared_type)).then_some(declared_type)
}

/// Attribute-spelled references grouped by role, roles in first-seen order.
fn attribute_references(node: &Node) -> Vec<(&str, Vec<String>)> {
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
    for reference in &node.references {
        if reference.spelling != ReferenceSpelling::Attribute {
            continue;
        }
        let token = reference.target.href();
        match groups.iter_mut().find(|(role, _)| *role == reference.role) {
            Some((_, tokens)) => tokens.push(token),
            None => groups.push((reference.role.as_str(), vec![token])),
        }
    }
    groups
}

/// Render one file of the graph.
pub fn render_file(graph: &ModelGraph, file: &CdmFile, config: &EngineConfig) -> String {
    let mut writer = FileWriter {
        graph,
        config,
        out: String::new(),
    };
    writer.write_root(file);
    writer.out
}

/// Write every file of the graph into `dest`. Returns the number of files.
pub(crate) fn write_all(
    graph: &ModelGraph,
    config: &EngineConfig,
    dest: &dyn CdmDirectory,
    progress: &dyn ProgressSink,
) -> Result<usize, IoError> {
    let total = graph.files().len();
    for (done, file) in graph.files().iter().enumerate() {
        let text = render_file(graph, file, config);
        dest.write_file(&file.name, text.as_bytes())?;
        tracing::debug!(file = %file.name, bytes = text.len(), "wrote file");
        progress.report(ProgressStage::Writing, done + 1, total);
    }
    tracing::info!(location = %dest.location(), files = total, "saved CDM");
    Ok(total)
}
