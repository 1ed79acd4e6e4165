//! The in-memory model graph.
//!
//! Nodes live in an arena indexed by `NodeId`; every edge (inline ownership,
//! containment proxy, reference) stores the target's UUID plus, once
//! resolved, its arena index. The UUID → index map is the single source of
//! identity and is kept in sync by every mutation.

use crate::schema::{self, ATTR_NAME};
use ahash::AHashMap;
use cdm_uuid::Uuid;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a source file in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FileId(u32);

impl FileId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

// ============================================================================
// Node parts
// ============================================================================

/// How a simple attribute is spelled in markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeStyle {
    /// `name="value"` on the element.
    Inline,
    /// `<name>value</name>` child element.
    Element,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub style: AttributeStyle,
}

impl Attribute {
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            style: AttributeStyle::Inline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Not looked up yet (fast load).
    Pending,
    Live(NodeId),
    Broken,
}

/// Target of an edge: the identifier plus the file the markup pointed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTarget {
    pub uuid: Uuid,
    /// File part of an `href`, if the markup carried one.
    pub file_hint: Option<String>,
    pub resolution: Resolution,
}

impl EdgeTarget {
    pub fn new(uuid: Uuid, file_hint: Option<String>) -> Self {
        Self {
            uuid,
            file_hint,
            resolution: Resolution::Pending,
        }
    }

    pub fn live(&self) -> Option<NodeId> {
        match self.resolution {
            Resolution::Live(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_broken(&self) -> bool {
        self.resolution == Resolution::Broken
    }

    /// Markup spelling: `file#_compact` or `_compact`.
    pub fn href(&self) -> String {
        let compact = cdm_uuid::to_compact(&self.uuid);
        match &self.file_hint {
            Some(file) => format!("{file}#{compact}"),
            None => compact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceSpelling {
    /// One token of an attribute value.
    Attribute,
    /// `<role href="..."/>` child element.
    Element { declared_type: Option<String> },
}

/// A non-owning edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub role: String,
    pub target: EdgeTarget,
    pub spelling: ReferenceSpelling,
}

/// An owned node stored as the root of another file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainmentProxy {
    pub tag: String,
    pub declared_type: Option<String>,
    pub target: EdgeTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Containment {
    Inline(NodeId),
    Proxy(ContainmentProxy),
}

impl Containment {
    /// The owned node, if known.
    pub fn child(&self) -> Option<NodeId> {
        match self {
            Containment::Inline(id) => Some(*id),
            Containment::Proxy(proxy) => proxy.target.live(),
        }
    }
}

// ============================================================================
// Node
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub tag: String,
    pub declared_type: Option<String>,
    pub attributes: Vec<Attribute>,
    pub containments: Vec<Containment>,
    pub references: Vec<Reference>,
    pub parent: Option<NodeId>,
    pub file: FileId,
}

impl Node {
    pub fn new(id: Uuid, tag: impl Into<String>, file: FileId) -> Self {
        Self {
            id,
            tag: tag.into(),
            declared_type: None,
            attributes: Vec::new(),
            containments: Vec::new(),
            references: Vec::new(),
            parent: None,
            file,
        }
    }

    pub fn compact_id(&self) -> String {
        cdm_uuid::to_compact(&self.id)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute(ATTR_NAME)
    }

    /// Set an attribute, keeping its position and style if it already exists.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute::inline(name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let pos = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(pos))
    }

    pub fn has_type(&self, declared_type: &str) -> bool {
        self.declared_type.as_deref() == Some(declared_type)
    }

    pub fn is_mce(&self) -> bool {
        self.has_type(schema::MCE_TYPE)
    }

    /// Short human-readable label used in problem reports.
    pub fn label(&self) -> String {
        let kind = self
            .declared_type
            .as_deref()
            .map(|t| t.rsplit(':').next().unwrap_or(t))
            .unwrap_or(self.tag.as_str());
        match self.name() {
            Some(name) => format!("{kind} \"{name}\" ({})", self.compact_id()),
            None => format!("{kind} ({})", self.compact_id()),
        }
    }
}

// ============================================================================
// Files
// ============================================================================

/// A source file: document-level metadata plus its root node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdmFile {
    pub name: String,
    pub xmi_version: Option<String>,
    /// `xmlns:*` declarations in document order, as `(prefix, uri)`.
    pub namespaces: Vec<(String, String)>,
    pub root: NodeId,
}

impl CdmFile {
    pub fn cdm_namespaces(&self) -> impl Iterator<Item = schema::CdmNamespace> + '_ {
        self.namespaces
            .iter()
            .filter_map(|(_, uri)| schema::CdmNamespace::parse(uri))
    }
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ModelGraph {
    nodes: Vec<Node>,
    files: Vec<CdmFile>,
    index: AHashMap<Uuid, NodeId>,
}

impl ModelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn lookup(&self, uuid: &Uuid) -> Option<NodeId> {
        self.index.get(uuid).copied()
    }

    pub fn files(&self) -> &[CdmFile] {
        &self.files
    }

    pub(crate) fn files_mut(&mut self) -> &mut [CdmFile] {
        &mut self.files
    }

    pub fn file(&self, id: FileId) -> Option<&CdmFile> {
        self.files.get(id.0 as usize)
    }

    pub fn file_name_of(&self, id: NodeId) -> &str {
        self.node(id)
            .and_then(|n| self.file(n.file))
            .map(|f| f.name.as_str())
            .unwrap_or("?")
    }

    pub(crate) fn next_file_id(&self) -> FileId {
        FileId(self.files.len() as u32)
    }

    pub(crate) fn push_file(&mut self, file: CdmFile) -> FileId {
        let id = self.next_file_id();
        self.files.push(file);
        id
    }

    /// Append a node; fails with the id of the node already holding its UUID.
    pub(crate) fn insert_node(&mut self, node: Node) -> Result<NodeId, NodeId> {
        if let Some(existing) = self.lookup(&node.id) {
            return Err(existing);
        }
        let id = NodeId(self.nodes.len() as u32);
        self.index.insert(node.id, id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Look up every proxy and reference target. Returns `(live, broken)`.
    pub(crate) fn resolve_edges(&mut self) -> (usize, usize) {
        let index = &self.index;
        let mut live = 0;
        let mut broken = 0;
        let mut resolve = |target: &mut EdgeTarget| {
            target.resolution = match index.get(&target.uuid) {
                Some(id) => {
                    live += 1;
                    Resolution::Live(*id)
                }
                None => {
                    broken += 1;
                    Resolution::Broken
                }
            };
        };
        for node in &mut self.nodes {
            for containment in &mut node.containments {
                if let Containment::Proxy(proxy) = containment {
                    resolve(&mut proxy.target);
                }
            }
            for reference in &mut node.references {
                resolve(&mut reference.target);
            }
        }
        (live, broken)
    }

    /// Give every proxy target without an owner the proxy's holder as parent.
    /// A target owned twice keeps its first owner.
    pub(crate) fn adopt_proxy_targets(&mut self) {
        let mut adoptions = Vec::new();
        for (owner, node) in self.nodes() {
            for containment in &node.containments {
                if let Containment::Proxy(proxy) = containment {
                    if let Some(child) = proxy.target.live() {
                        adoptions.push((child, owner));
                    }
                }
            }
        }
        for (child, owner) in adoptions {
            if let Some(node) = self.node_mut(child) {
                if node.parent.is_none() && child != owner {
                    node.parent = Some(owner);
                }
            }
        }
    }

    /// Whether the node is the root element of its file.
    pub fn is_file_root(&self, id: NodeId) -> bool {
        self.node(id)
            .and_then(|n| self.file(n.file))
            .is_some_and(|f| f.root == id)
    }

    /// MCE children in document order, following ownership only.
    pub fn mce_children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        node.containments
            .iter()
            .filter_map(Containment::child)
            .filter(|child| {
                self.node(*child)
                    .is_some_and(|c| c.is_mce() && c.parent == Some(id))
            })
            .collect()
    }

    /// MCEs without an MCE owner, in arena order.
    pub fn mce_roots(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.is_mce())
            .filter(|(_, node)| match node.parent {
                None => true,
                Some(parent) => !self.node(parent).is_some_and(Node::is_mce),
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Create a node owned inline by `parent`, in the parent's file.
    pub(crate) fn add_inline_child(&mut self, parent: NodeId, mut child: Node) -> Option<NodeId> {
        let file = self.node(parent)?.file;
        child.file = file;
        child.parent = Some(parent);
        let id = self.insert_node(child).ok()?;
        self.node_mut(parent)?
            .containments
            .push(Containment::Inline(id));
        Some(id)
    }

    /// Remove the given nodes together with everything they own inline.
    /// File roots are never removed. Returns the number of removed nodes.
    ///
    /// Edges into removed nodes become broken; arena indices are compacted.
    pub(crate) fn remove_subtrees(&mut self, roots: &[NodeId]) -> usize {
        let mut doomed: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = roots
            .iter()
            .copied()
            .filter(|id| !self.is_file_root(*id))
            .collect();
        while let Some(id) = stack.pop() {
            if !doomed.insert(id) {
                continue;
            }
            if let Some(node) = self.node(id) {
                for containment in &node.containments {
                    if let Containment::Inline(child) = containment {
                        stack.push(*child);
                    }
                }
            }
        }
        if doomed.is_empty() {
            return 0;
        }

        let mut remap: Vec<Option<NodeId>> = Vec::with_capacity(self.nodes.len());
        let mut next = 0u32;
        for i in 0..self.nodes.len() {
            if doomed.contains(&NodeId(i as u32)) {
                remap.push(None);
            } else {
                remap.push(Some(NodeId(next)));
                next += 1;
            }
        }
        let map = |id: NodeId| remap[id.index()];

        let old_nodes = std::mem::take(&mut self.nodes);
        self.index.clear();
        for (i, mut node) in old_nodes.into_iter().enumerate() {
            if remap[i].is_none() {
                continue;
            }
            node.parent = node.parent.and_then(map);
            node.containments.retain_mut(|c| match c {
                Containment::Inline(child) => match map(*child) {
                    Some(new_id) => {
                        *child = new_id;
                        true
                    }
                    None => false,
                },
                Containment::Proxy(proxy) => {
                    remap_target(&mut proxy.target, &map);
                    true
                }
            });
            for reference in &mut node.references {
                remap_target(&mut reference.target, &map);
            }
            self.index.insert(node.id, NodeId(self.nodes.len() as u32));
            self.nodes.push(node);
        }
        for file in &mut self.files {
            if let Some(root) = map(file.root) {
                file.root = root;
            }
        }
        doomed.len()
    }

    /// Order-independent view used to compare graphs.
    pub fn snapshot(&self) -> GraphSnapshot {
        let uuid_of = |id: NodeId| self.node(id).map(|n| n.id);
        let mut nodes = BTreeMap::new();
        for (_, node) in self.nodes() {
            let mut attributes: Vec<(String, String)> = node
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect();
            attributes.sort();
            let mut owned: Vec<(String, Uuid)> = node
                .containments
                .iter()
                .map(|c| match c {
                    Containment::Inline(id) => (
                        self.node(*id).map(|n| n.tag.clone()).unwrap_or_default(),
                        uuid_of(*id).unwrap_or_default(),
                    ),
                    Containment::Proxy(proxy) => (proxy.tag.clone(), proxy.target.uuid),
                })
                .collect();
            owned.sort();
            let mut references: Vec<(String, Uuid)> = node
                .references
                .iter()
                .map(|r| (r.role.clone(), r.target.uuid))
                .collect();
            references.sort();
            nodes.insert(
                node.id,
                NodeSnapshot {
                    tag: node.tag.clone(),
                    declared_type: node.declared_type.clone(),
                    file: self
                        .file(node.file)
                        .map(|f| f.name.clone())
                        .unwrap_or_default(),
                    attributes,
                    owned,
                    references,
                },
            );
        }
        let mut files: Vec<(String, Vec<(String, String)>)> = self
            .files
            .iter()
            .map(|f| {
                let mut ns = f.namespaces.clone();
                ns.sort();
                (f.name.clone(), ns)
            })
            .collect();
        files.sort();
        GraphSnapshot { nodes, files }
    }
}

fn remap_target(target: &mut EdgeTarget, map: &impl Fn(NodeId) -> Option<NodeId>) {
    if let Resolution::Live(id) = target.resolution {
        target.resolution = match map(id) {
            Some(new_id) => Resolution::Live(new_id),
            None => Resolution::Broken,
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub tag: String,
    pub declared_type: Option<String>,
    pub file: String,
    pub attributes: Vec<(String, String)>,
    /// `(tag, uuid)` of owned nodes.
    pub owned: Vec<(String, Uuid)>,
    /// `(role, uuid)` of references.
    pub references: Vec<(String, Uuid)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub nodes: BTreeMap<Uuid, NodeSnapshot>,
    pub files: Vec<(String, Vec<(String, String)>)>,
}
