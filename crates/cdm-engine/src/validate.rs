//! Structural checks over a loaded graph.
//!
//! Validation never fails and never mutates: every finding becomes one line
//! in a `ValidationReport`. Checks run in a fixed order and visit nodes in
//! arena order, so two runs over the same graph give identical reports.

use crate::graph::{Containment, EdgeTarget, ModelGraph, NodeId, Resolution};
use crate::model::CdmMetadata;
use crate::schema;
use ahash::AHashMap;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub problems: Vec<String>,
}

impl ValidationReport {
    pub fn count(&self) -> usize {
        self.problems.len()
    }

    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    fn push(&mut self, problem: String) {
        self.problems.push(problem);
    }
}

/// Target of an edge, looking it up directly when the edge was never resolved.
fn target_of(graph: &ModelGraph, target: &EdgeTarget) -> Option<NodeId> {
    match target.resolution {
        Resolution::Live(id) => Some(id),
        Resolution::Broken => None,
        Resolution::Pending => graph.lookup(&target.uuid),
    }
}

/// Owned children of a node: inline ones and proxy targets that exist.
fn owned_children(graph: &ModelGraph, id: NodeId) -> Vec<NodeId> {
    graph
        .node(id)
        .map(|node| {
            node.containments
                .iter()
                .filter_map(|c| match c {
                    Containment::Inline(child) => Some(*child),
                    Containment::Proxy(proxy) => target_of(graph, &proxy.target),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn validate(graph: &ModelGraph, metadata: &CdmMetadata) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_broken_edges(graph, &mut report);
    check_unique_identifiers(graph, &mut report);
    let owners = owner_counts(graph);
    check_single_owner(graph, &owners, &mut report);
    check_reachability(graph, &owners, &mut report);
    check_required_attributes(graph, metadata, &mut report);
    check_file_namespaces(graph, metadata, &mut report);
    tracing::debug!(problems = report.count(), "validated CDM");
    report
}

fn check_broken_edges(graph: &ModelGraph, report: &mut ValidationReport) {
    for (id, node) in graph.nodes() {
        let file = graph.file_name_of(id);
        for containment in &node.containments {
            if let Containment::Proxy(proxy) = containment {
                if target_of(graph, &proxy.target).is_none() {
                    report.push(format!(
                        "{} in {file}: containment `{}` points at missing node {}",
                        node.label(),
                        proxy.tag,
                        proxy.target.href()
                    ));
                }
            }
        }
        for reference in &node.references {
            if target_of(graph, &reference.target).is_none() {
                report.push(format!(
                    "{} in {file}: reference `{}` points at missing node {}",
                    node.label(),
                    reference.role,
                    reference.target.href()
                ));
            }
        }
    }
}

fn check_unique_identifiers(graph: &ModelGraph, report: &mut ValidationReport) {
    let mut seen: AHashMap<_, NodeId> = AHashMap::with_capacity(graph.len());
    for (id, node) in graph.nodes() {
        if let Some(first) = seen.insert(node.id, id) {
            report.push(format!(
                "identifier {} is used by nodes in {} and {}",
                node.compact_id(),
                graph.file_name_of(first),
                graph.file_name_of(id)
            ));
        }
    }
}

fn owner_counts(graph: &ModelGraph) -> Vec<usize> {
    let mut counts = vec![0usize; graph.len()];
    for id in graph.node_ids() {
        for child in owned_children(graph, id) {
            if let Some(count) = counts.get_mut(child.raw() as usize) {
                *count += 1;
            }
        }
    }
    counts
}

fn check_single_owner(graph: &ModelGraph, owners: &[usize], report: &mut ValidationReport) {
    for (id, node) in graph.nodes() {
        let count = owners[id.raw() as usize];
        if count > 1 {
            report.push(format!(
                "{} in {} is owned by {count} nodes",
                node.label(),
                graph.file_name_of(id)
            ));
        }
    }
}

/// Designated roots are file roots nobody owns.
fn designated_roots(graph: &ModelGraph, owners: &[usize]) -> Vec<NodeId> {
    graph
        .files()
        .iter()
        .map(|f| f.root)
        .filter(|root| owners.get(root.raw() as usize) == Some(&0))
        .collect()
}

fn check_reachability(graph: &ModelGraph, owners: &[usize], report: &mut ValidationReport) {
    let mut reached = vec![false; graph.len()];
    let mut queue: VecDeque<NodeId> = designated_roots(graph, owners).into();
    while let Some(id) = queue.pop_front() {
        let Some(slot) = reached.get_mut(id.raw() as usize) else {
            continue;
        };
        if *slot {
            continue;
        }
        *slot = true;
        queue.extend(owned_children(graph, id));
    }
    for (id, node) in graph.nodes() {
        if !reached[id.raw() as usize] {
            report.push(format!(
                "{} in {} is not reachable from any root",
                node.label(),
                graph.file_name_of(id)
            ));
        }
    }
}

fn check_required_attributes(
    graph: &ModelGraph,
    metadata: &CdmMetadata,
    report: &mut ValidationReport,
) {
    let version = metadata.version.as_deref();
    for (id, node) in graph.nodes() {
        let Some(declared_type) = node.declared_type.as_deref() else {
            continue;
        };
        for rule in schema::required_attributes_for(declared_type, version) {
            if node.attribute(rule.attribute).is_none() {
                report.push(format!(
                    "{} in {} is missing required attribute `{}`",
                    node.label(),
                    graph.file_name_of(id),
                    rule.attribute
                ));
            }
        }
    }
}

fn check_file_namespaces(graph: &ModelGraph, metadata: &CdmMetadata, report: &mut ValidationReport) {
    let (Some(version), Some(prefix)) = (metadata.version.as_deref(), metadata.prefix.as_deref())
    else {
        return;
    };
    for file in graph.files() {
        for ns in file.cdm_namespaces() {
            if ns.version != version || ns.prefix != prefix {
                report.push(format!(
                    "{} declares namespace {}, but the CDM is version {version} with prefix {prefix}",
                    file.name,
                    ns.uri()
                ));
            }
        }
    }
}
