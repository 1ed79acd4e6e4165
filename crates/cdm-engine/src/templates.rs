//! Creating a new CDM from a template.

use crate::config::EngineConfig;
use crate::dir::{CdmDirectory, ProgressSink};
use crate::error::{ConversionError, IoError, Result};
use crate::graph::{CdmFile, FileId, ModelGraph, Node, NodeId};
use crate::loader::CdmLoader;
use crate::model::CdmModel;
use crate::schema::{
    namespace_uri, ATTR_NAME, MANIFEST_TYPE, MCM_CI_TYPE, MCE_TYPE, XMI_NAMESPACE,
    XSI_NAMESPACE,
};
use crate::serialize;
use crate::version::{highest_known_version, prefix_for_version};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// Manifest plus one MCM configuration item with a root MCE.
    #[default]
    Mcm,
    /// Manifest only.
    Empty,
}

impl Template {
    pub const ALL: [Template; 2] = [Template::Mcm, Template::Empty];

    pub fn short_name(self) -> &'static str {
        match self {
            Template::Mcm => "mcm",
            Template::Empty => "empty",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Template::Mcm => "Manifest and one MCM configuration item with a root element",
            Template::Empty => "Manifest only",
        }
    }

    pub fn from_short(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.short_name() == name)
    }
}

/// `(short name, description)` of every template, default first.
pub fn templates() -> Vec<(&'static str, &'static str)> {
    Template::ALL
        .iter()
        .map(|t| (t.short_name(), t.description()))
        .collect()
}

const MCM_FILE: &str = "Mcm.cdm";
const ROOT_MCE_NAME: &str = "Root";

fn namespaces(prefix: &str, version: &str, packages: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut out = vec![
        ("xmi".to_string(), XMI_NAMESPACE.to_string()),
        ("xsi".to_string(), XSI_NAMESPACE.to_string()),
    ];
    out.extend(
        packages
            .iter()
            .map(|(ns, package)| (ns.to_string(), namespace_uri(prefix, package, version))),
    );
    out
}

fn push_root(
    graph: &mut ModelGraph,
    file: CdmFile,
    declared_type: &str,
    name: &str,
) -> Option<NodeId> {
    let file_id = graph.push_file(file);
    let mut root = Node::new(cdm_uuid::generate(), declared_type, file_id);
    root.declared_type = Some(declared_type.to_string());
    root.set_attribute(ATTR_NAME, name);
    graph.insert_node(root).ok()
}

fn build(template: Template, version: &str, prefix: &str, config: &EngineConfig) -> ModelGraph {
    let mut graph = ModelGraph::new();
    let xmi_version = Some(config.xmi_version.clone());

    let root = NodeId::new(graph.len() as u32);
    push_root(
        &mut graph,
        CdmFile {
            name: config.header_file.clone(),
            xmi_version: xmi_version.clone(),
            namespaces: namespaces(prefix, version, &[("configurationcontrol", "ConfigurationControl")]),
            root,
        },
        MANIFEST_TYPE,
        "Manifest",
    );

    if template == Template::Mcm {
        let root = NodeId::new(graph.len() as u32);
        let ci = push_root(
            &mut graph,
            CdmFile {
                name: MCM_FILE.to_string(),
                xmi_version,
                namespaces: namespaces(
                    prefix,
                    version,
                    &[
                        ("configurationcontrol", "ConfigurationControl"),
                        ("monitoringcontrol", "MonitoringControl"),
                    ],
                ),
                root,
            },
            MCM_CI_TYPE,
            "Mcm",
        );
        let mut mce = Node::new(cdm_uuid::generate(), "monitoringControlElement", FileId::new(0));
        mce.declared_type = Some(MCE_TYPE.to_string());
        mce.set_attribute(ATTR_NAME, ROOT_MCE_NAME);
        if let Some(ci) = ci {
            graph.add_inline_child(ci, mce);
        }
    }
    graph
}

/// Write `template` into the empty directory `dir` and load the result.
///
/// `version` defaults to the highest known version and `prefix` to the
/// version's canonical prefix.
pub fn create_cdm(
    dir: Box<dyn CdmDirectory>,
    version: Option<&str>,
    prefix: Option<&str>,
    template: Template,
    config: &EngineConfig,
    progress: &dyn ProgressSink,
) -> Result<CdmModel> {
    let version = version.unwrap_or(highest_known_version());
    let prefix = match prefix {
        Some(blank) if blank.trim().is_empty() => {
            return Err(ConversionError::InconsistentPrefix {
                version: version.to_string(),
                prefix: blank.to_string(),
                expected: prefix_for_version(version).unwrap_or_default().to_string(),
            }
            .into())
        }
        Some(prefix) if prefix.ends_with('/') => prefix.to_string(),
        Some(prefix) => format!("{prefix}/"),
        None => prefix_for_version(version)
            .ok_or_else(|| ConversionError::UnknownVersion {
                version: version.to_string(),
            })?
            .to_string(),
    };
    if !dir.is_empty()? {
        return Err(IoError::DestinationNotEmpty {
            location: dir.location(),
        }
        .into());
    }

    tracing::info!(
        location = %dir.location(),
        template = template.short_name(),
        %version,
        %prefix,
        "creating CDM"
    );
    let graph = build(template, version, &prefix, config);
    serialize::write_all(&graph, config, dir.as_ref(), progress)?;
    CdmLoader::new(config.clone()).load_full(dir, progress)
}
