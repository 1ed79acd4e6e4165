//! Text views over any `CdmController`.

use crate::error::Result;
use crate::graph::{AttributeStyle, NodeId, ReferenceSpelling};
use crate::model::CdmController;
use std::fmt::Write as _;

const UNNAMED: &str = "(unnamed)";

/// The MCE forest, one line per MCE, two spaces of indentation per level and
/// a blank line between root trees.
pub fn render_mce_tree<C: CdmController + ?Sized>(model: &C) -> Result<String> {
    let mut out = String::new();
    for (i, root) in model.tree_roots()?.into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = model.node(id) else {
                continue;
            };
            let _ = writeln!(
                out,
                "{}{}",
                "  ".repeat(depth),
                node.name().unwrap_or(UNNAMED)
            );
            let children = model.mce_children(id);
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }
    }
    Ok(out)
}

/// Multi-line description of one node, or `None` if it does not exist.
pub fn describe_node<C: CdmController + ?Sized>(model: &C, id: NodeId) -> Option<String> {
    let node = model.node(id)?;
    let mut out = String::new();
    let _ = writeln!(out, "{}", node.name().unwrap_or(UNNAMED));
    let _ = writeln!(
        out,
        "  type: {}",
        node.declared_type.as_deref().unwrap_or("(none)")
    );
    let _ = writeln!(out, "  tag: {}", node.tag);
    let _ = writeln!(
        out,
        "  id: {} ({})",
        node.compact_id(),
        cdm_uuid::to_canonical(&node.id)
    );
    if !node.attributes.is_empty() {
        out.push_str("  attributes:\n");
        for attribute in &node.attributes {
            let marker = match attribute.style {
                AttributeStyle::Inline => "",
                AttributeStyle::Element => " (element)",
            };
            let _ = writeln!(out, "    {} = {}{marker}", attribute.name, attribute.value);
        }
    }
    if !node.references.is_empty() {
        out.push_str("  references:\n");
        for reference in &node.references {
            let target = reference
                .target
                .live()
                .and_then(|t| model.node(t))
                .and_then(|t| t.name())
                .map(|name| format!(" \"{name}\""))
                .unwrap_or_default();
            let broken = if reference.target.is_broken() {
                " (broken)"
            } else {
                ""
            };
            let kind = match reference.spelling {
                ReferenceSpelling::Attribute => "",
                ReferenceSpelling::Element { .. } => " (element)",
            };
            let _ = writeln!(
                out,
                "    {} -> {}{target}{broken}{kind}",
                reference.role,
                reference.target.href()
            );
        }
    }
    Some(out)
}
