//! Secondary indices over the graph and the `NodeQuery` builder.
//!
//! Indices map a key (name, declared type, tag) to the set of arena indices
//! carrying it. They are built in one pass on first use and dropped by the
//! model whenever the graph is mutated.

use crate::graph::{ModelGraph, NodeId};
use ahash::AHashMap;
use roaring::RoaringBitmap;

#[derive(Debug, Default, Clone)]
pub struct QueryIndex {
    by_name: AHashMap<String, RoaringBitmap>,
    by_type: AHashMap<String, RoaringBitmap>,
    by_tag: AHashMap<String, RoaringBitmap>,
}

fn insert(index: &mut AHashMap<String, RoaringBitmap>, key: &str, id: NodeId) {
    index
        .entry(key.to_string())
        .or_insert_with(RoaringBitmap::new)
        .insert(id.raw());
}

fn ids(bitmap: Option<&RoaringBitmap>) -> Vec<NodeId> {
    bitmap
        .map(|b| b.iter().map(NodeId::new).collect())
        .unwrap_or_default()
}

impl QueryIndex {
    pub fn build(graph: &ModelGraph) -> Self {
        let mut index = Self::default();
        for (id, node) in graph.nodes() {
            if let Some(name) = node.name() {
                insert(&mut index.by_name, name, id);
            }
            if let Some(declared_type) = node.declared_type.as_deref() {
                insert(&mut index.by_type, declared_type, id);
            }
            insert(&mut index.by_tag, &node.tag, id);
        }
        tracing::debug!(
            nodes = graph.len(),
            names = index.by_name.len(),
            types = index.by_type.len(),
            "built query index"
        );
        index
    }

    pub fn by_name(&self, name: &str) -> Option<&RoaringBitmap> {
        self.by_name.get(name)
    }

    pub fn by_type(&self, declared_type: &str) -> Option<&RoaringBitmap> {
        self.by_type.get(declared_type)
    }

    pub fn by_tag(&self, tag: &str) -> Option<&RoaringBitmap> {
        self.by_tag.get(tag)
    }

    pub fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        ids(self.by_name(name))
    }

    pub fn find_by_type(&self, declared_type: &str) -> Vec<NodeId> {
        ids(self.by_type(declared_type))
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        ids(self.by_tag(tag))
    }
}

/// Collects optional criteria and returns every node matching any of them.
///
/// ```
/// use cdm_engine::NodeQuery;
///
/// let query = NodeQuery::new().name("Battery").tag("subElements");
/// assert!(!query.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeQuery {
    names: Vec<String>,
    types: Vec<String>,
    tags: Vec<String>,
}

impl NodeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn declared_type(mut self, declared_type: impl Into<String>) -> Self {
        self.types.push(declared_type.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.types.is_empty() && self.tags.is_empty()
    }

    /// Union of all criteria, in ascending arena order.
    pub fn run(&self, index: &QueryIndex) -> Vec<NodeId> {
        let mut out = RoaringBitmap::new();
        let hits = self
            .names
            .iter()
            .filter_map(|n| index.by_name(n))
            .chain(self.types.iter().filter_map(|t| index.by_type(t)))
            .chain(self.tags.iter().filter_map(|t| index.by_tag(t)));
        for bitmap in hits {
            out |= bitmap;
        }
        out.iter().map(NodeId::new).collect()
    }
}
