//! Version conversion: namespace rewriting plus a fixed table of structural
//! rewrite rules between adjacent CDM versions.
//!
//! Upgrades apply forward rules oldest first; downgrades apply the inverse
//! rules newest first. Inverting a "requires" rule only removes data under
//! `DowngradePolicy::DropDeprecated`.

use crate::error::ConversionError;
use crate::graph::{Containment, FileId, ModelGraph, Node, NodeId, ReferenceSpelling};
use crate::model::CdmMetadata;
use crate::schema::{self, namespace_uri, ACTIVITY_TYPE, MCE_DEFINITION_TYPE, MCE_TYPE};
use crate::version::{lookup_version, version_position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixPolicy {
    /// Only the version's canonical prefix is accepted.
    #[default]
    Canonical,
    /// Any prefix given by the caller is used as is.
    Trusted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DowngradePolicy {
    /// Keep attributes and children the older version does not require.
    #[default]
    Preserve,
    /// Remove them.
    DropDeprecated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub version: String,
    pub prefix: Option<String>,
    pub prefix_policy: PrefixPolicy,
    pub downgrade_policy: DowngradePolicy,
}

impl ConversionRequest {
    pub fn to_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            prefix: None,
            prefix_policy: PrefixPolicy::Canonical,
            downgrade_policy: DowngradePolicy::Preserve,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn trusting_prefix(mut self) -> Self {
        self.prefix_policy = PrefixPolicy::Trusted;
        self
    }

    pub fn dropping_deprecated(mut self) -> Self {
        self.downgrade_policy = DowngradePolicy::DropDeprecated;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub from_version: Option<String>,
    pub from_prefix: Option<String>,
    pub to_version: String,
    pub to_prefix: String,
    pub no_op: bool,
    pub steps: Vec<String>,
    pub namespaces_rewritten: usize,
    pub nodes_created: usize,
    pub nodes_removed: usize,
    pub attributes_added: usize,
    pub attributes_removed: usize,
    pub attributes_renamed: usize,
    pub tags_renamed: usize,
}

// ============================================================================
// Rewrite table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RewriteRule {
    /// Containment/reference tag rename, wherever the tag appears.
    RenameTag {
        from: &'static str,
        to: &'static str,
    },
    /// Nodes of `declared_type` must carry `attribute`.
    RequireAttribute {
        declared_type: &'static str,
        attribute: &'static str,
        default: &'static str,
    },
    /// Attribute or reference role rename on nodes of `declared_type`.
    RenameAttribute {
        declared_type: &'static str,
        from: &'static str,
        to: &'static str,
    },
    /// Nodes of `declared_type` must own a `tag` child of `child_type`,
    /// named after the owner plus `name_suffix`.
    RequireChild {
        declared_type: &'static str,
        tag: &'static str,
        child_type: &'static str,
        name_suffix: &'static str,
    },
}

impl RewriteRule {
    fn describe(&self) -> String {
        match self {
            RewriteRule::RenameTag { from, to } => format!("rename tag `{from}` to `{to}`"),
            RewriteRule::RequireAttribute {
                declared_type,
                attribute,
                ..
            } => format!("require attribute `{attribute}` on {declared_type}"),
            RewriteRule::RenameAttribute {
                declared_type,
                from,
                to,
            } => format!("rename `{from}` to `{to}` on {declared_type}"),
            RewriteRule::RequireChild {
                declared_type,
                tag,
                ..
            } => format!("require child `{tag}` on {declared_type}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RewriteStep {
    from: &'static str,
    to: &'static str,
    rule: RewriteRule,
}

const REWRITE_STEPS: &[RewriteStep] = &[
    RewriteStep {
        from: "1.10.1",
        to: "1.12",
        rule: RewriteRule::RenameTag {
            from: "subMonitoringControlElements",
            to: "subElements",
        },
    },
    RewriteStep {
        from: "1.12.1",
        to: "1.13.0bd1",
        rule: RewriteRule::RequireAttribute {
            declared_type: ACTIVITY_TYPE,
            attribute: "executable",
            default: "true",
        },
    },
    RewriteStep {
        from: "1.13.0bd1",
        to: "1.14.0b",
        rule: RewriteRule::RenameAttribute {
            declared_type: MCE_TYPE,
            from: "defaultRoute",
            to: "defaultServiceAccessPoint",
        },
    },
    RewriteStep {
        from: "1.14.0b",
        to: "1.14.0",
        rule: RewriteRule::RequireChild {
            declared_type: MCE_TYPE,
            tag: "definition",
            child_type: MCE_DEFINITION_TYPE,
            name_suffix: "Definition",
        },
    },
];

/// Steps lying between generations `low` and `high` (inclusive), oldest first.
fn steps_between(low: usize, high: usize) -> Vec<&'static RewriteStep> {
    REWRITE_STEPS
        .iter()
        .filter(|step| {
            match (version_position(step.from), version_position(step.to)) {
                (Some(from), Some(to)) => from >= low && to <= high,
                _ => false,
            }
        })
        .collect()
}

// ============================================================================
// Conversion
// ============================================================================

/// Namespace prefixes always end with `/`.
fn normalize_prefix(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

pub(crate) fn convert(
    graph: &mut ModelGraph,
    metadata: &mut CdmMetadata,
    request: &ConversionRequest,
) -> Result<ConversionReport, ConversionError> {
    let target = lookup_version(&request.version);
    if let Some(prefix) = request.prefix.as_deref().filter(|p| p.trim().is_empty()) {
        return Err(ConversionError::InconsistentPrefix {
            version: request.version.clone(),
            prefix: prefix.to_string(),
            expected: target.map(|t| t.prefix.to_string()).unwrap_or_default(),
        });
    }
    let requested_prefix = request
        .prefix
        .as_deref()
        .map(normalize_prefix)
        .or_else(|| target.map(|t| t.prefix.to_string()));

    let same_version = metadata.version.as_deref() == Some(request.version.as_str());
    let same_prefix = match &requested_prefix {
        Some(prefix) => metadata.prefix.as_deref() == Some(prefix.as_str()),
        None => true,
    };
    if same_version && same_prefix {
        tracing::debug!(version = %request.version, "conversion is a no-op");
        return Ok(ConversionReport {
            from_version: metadata.version.clone(),
            from_prefix: metadata.prefix.clone(),
            to_version: request.version.clone(),
            to_prefix: metadata.prefix.clone().unwrap_or_default(),
            no_op: true,
            ..ConversionReport::default()
        });
    }

    let target = target.ok_or_else(|| ConversionError::UnknownVersion {
        version: request.version.clone(),
    })?;
    let prefix = requested_prefix.unwrap_or_else(|| target.prefix.to_string());
    if prefix != target.prefix && request.prefix_policy == PrefixPolicy::Canonical {
        return Err(ConversionError::InconsistentPrefix {
            version: target.version.to_string(),
            prefix,
            expected: target.prefix.to_string(),
        });
    }

    let to_pos = version_position(target.version).unwrap_or_default();
    let from_pos = if same_version {
        to_pos
    } else {
        let current = metadata.version.clone().unwrap_or_else(|| "unknown".to_string());
        version_position(&current).ok_or(ConversionError::UnknownSourceVersion { current })?
    };

    let mut report = ConversionReport {
        from_version: metadata.version.clone(),
        from_prefix: metadata.prefix.clone(),
        to_version: target.version.to_string(),
        to_prefix: prefix.clone(),
        ..ConversionReport::default()
    };
    tracing::info!(
        from = metadata.version.as_deref().unwrap_or("unknown"),
        to = target.version,
        %prefix,
        "converting CDM"
    );

    report.namespaces_rewritten = rewrite_namespaces(graph, &prefix, target.version);

    if from_pos < to_pos {
        for step in steps_between(from_pos, to_pos) {
            apply_forward(graph, &step.rule, &mut report);
            report
                .steps
                .push(format!("{} -> {}: {}", step.from, step.to, step.rule.describe()));
        }
    } else if from_pos > to_pos {
        for step in steps_between(to_pos, from_pos).into_iter().rev() {
            apply_inverse(graph, &step.rule, request.downgrade_policy, &mut report);
            report
                .steps
                .push(format!("{} -> {}: undo {}", step.to, step.from, step.rule.describe()));
        }
    }

    metadata.version = Some(target.version.to_string());
    metadata.prefix = Some(prefix);
    tracing::info!(
        steps = report.steps.len(),
        created = report.nodes_created,
        removed = report.nodes_removed,
        "converted CDM"
    );
    Ok(report)
}

fn rewrite_namespaces(graph: &mut ModelGraph, prefix: &str, version: &str) -> usize {
    let mut rewritten = 0;
    for file in graph.files_mut() {
        for (_, uri) in &mut file.namespaces {
            if let Some(ns) = schema::CdmNamespace::parse(uri) {
                let new_uri = namespace_uri(prefix, &ns.package, version);
                if *uri != new_uri {
                    *uri = new_uri;
                    rewritten += 1;
                }
            }
        }
    }
    rewritten
}

fn rename_tag(graph: &mut ModelGraph, from: &str, to: &str) -> usize {
    let mut renamed = 0;
    for node in graph.nodes_mut() {
        if node.tag == from {
            node.tag = to.to_string();
            renamed += 1;
        }
        for containment in &mut node.containments {
            if let Containment::Proxy(proxy) = containment {
                if proxy.tag == from {
                    proxy.tag = to.to_string();
                    renamed += 1;
                }
            }
        }
        for reference in &mut node.references {
            if matches!(reference.spelling, ReferenceSpelling::Element { .. })
                && reference.role == from
            {
                reference.role = to.to_string();
                renamed += 1;
            }
        }
    }
    renamed
}

fn rename_attribute(graph: &mut ModelGraph, declared_type: &str, from: &str, to: &str) -> usize {
    let mut renamed = 0;
    for node in graph.nodes_mut().filter(|n| n.has_type(declared_type)) {
        for attribute in &mut node.attributes {
            if attribute.name == from {
                attribute.name = to.to_string();
                renamed += 1;
            }
        }
        for reference in &mut node.references {
            if reference.role == from {
                reference.role = to.to_string();
                renamed += 1;
            }
        }
    }
    renamed
}

fn owns_tag(node: &Node, graph: &ModelGraph, tag: &str) -> bool {
    node.containments.iter().any(|c| match c {
        Containment::Inline(child) => graph.node(*child).is_some_and(|n| n.tag == tag),
        Containment::Proxy(proxy) => proxy.tag == tag,
    })
}

fn apply_forward(graph: &mut ModelGraph, rule: &RewriteRule, report: &mut ConversionReport) {
    match *rule {
        RewriteRule::RenameTag { from, to } => {
            report.tags_renamed += rename_tag(graph, from, to);
        }
        RewriteRule::RenameAttribute {
            declared_type,
            from,
            to,
        } => {
            report.attributes_renamed += rename_attribute(graph, declared_type, from, to);
        }
        RewriteRule::RequireAttribute {
            declared_type,
            attribute,
            default,
        } => {
            for node in graph.nodes_mut().filter(|n| n.has_type(declared_type)) {
                if node.attribute(attribute).is_none() {
                    node.set_attribute(attribute, default);
                    report.attributes_added += 1;
                }
            }
        }
        RewriteRule::RequireChild {
            declared_type,
            tag,
            child_type,
            name_suffix,
        } => {
            let owners: Vec<(NodeId, String)> = graph
                .nodes()
                .filter(|(_, n)| n.has_type(declared_type) && !owns_tag(n, graph, tag))
                .map(|(id, n)| (id, format!("{}{name_suffix}", n.name().unwrap_or_default())))
                .collect();
            for (owner, name) in owners {
                let mut child = Node::new(cdm_uuid::generate(), tag, FileId::new(0));
                child.declared_type = Some(child_type.to_string());
                child.set_attribute(schema::ATTR_NAME, name);
                if graph.add_inline_child(owner, child).is_some() {
                    report.nodes_created += 1;
                }
            }
        }
    }
}

fn apply_inverse(
    graph: &mut ModelGraph,
    rule: &RewriteRule,
    policy: DowngradePolicy,
    report: &mut ConversionReport,
) {
    match *rule {
        RewriteRule::RenameTag { from, to } => {
            report.tags_renamed += rename_tag(graph, to, from);
        }
        RewriteRule::RenameAttribute {
            declared_type,
            from,
            to,
        } => {
            report.attributes_renamed += rename_attribute(graph, declared_type, to, from);
        }
        RewriteRule::RequireAttribute {
            declared_type,
            attribute,
            ..
        } => {
            if policy == DowngradePolicy::DropDeprecated {
                for node in graph.nodes_mut().filter(|n| n.has_type(declared_type)) {
                    if node.remove_attribute(attribute).is_some() {
                        report.attributes_removed += 1;
                    }
                }
            }
        }
        RewriteRule::RequireChild {
            declared_type,
            tag,
            child_type,
            ..
        } => {
            if policy == DowngradePolicy::DropDeprecated {
                let doomed: Vec<NodeId> = graph
                    .nodes()
                    .filter(|(_, n)| n.tag == tag && n.has_type(child_type))
                    .filter(|(_, n)| {
                        n.parent
                            .and_then(|p| graph.node(p))
                            .is_some_and(|p| p.has_type(declared_type))
                    })
                    .map(|(id, _)| id)
                    .collect();
                report.nodes_removed += graph.remove_subtrees(&doomed);
            }
        }
    }
}
