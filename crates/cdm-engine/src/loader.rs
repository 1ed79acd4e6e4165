//! Loading a CDM directory into a `CdmModel`.
//!
//! Files are parsed independently, merged into one graph in file-name order,
//! and (in full mode) cross-file edges are resolved. Any failure discards the
//! partial graph.

use crate::config::EngineConfig;
use crate::dir::{CdmDirectory, ProgressSink, ProgressStage};
use crate::error::{LoadError, Result};
use crate::graph::{CdmFile, Containment, ModelGraph, NodeId};
use crate::model::{CdmMetadata, CdmModel};
use crate::parse::{parse_file, ParsedFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Parse and index only; edges stay unresolved and the header is optional.
    Fast,
    /// Resolve every proxy and reference; the header is mandatory.
    Full,
}

/// Builds models from directories under one configuration.
#[derive(Debug, Clone, Default)]
pub struct CdmLoader {
    config: EngineConfig,
}

impl CdmLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn load_fast(
        &self,
        dir: Box<dyn CdmDirectory>,
        progress: &dyn ProgressSink,
    ) -> Result<CdmModel> {
        self.load(dir, LoadMode::Fast, progress)
    }

    pub fn load_full(
        &self,
        dir: Box<dyn CdmDirectory>,
        progress: &dyn ProgressSink,
    ) -> Result<CdmModel> {
        self.load(dir, LoadMode::Full, progress)
    }

    pub fn load(
        &self,
        dir: Box<dyn CdmDirectory>,
        mode: LoadMode,
        progress: &dyn ProgressSink,
    ) -> Result<CdmModel> {
        let location = dir.location();
        let files: Vec<String> = dir
            .list_files()?
            .into_iter()
            .filter(|name| self.config.is_model_file(name))
            .collect();
        tracing::info!(%location, ?mode, files = files.len(), "loading CDM");

        let total = files.len();
        let mut graph = ModelGraph::new();
        let mut header: Option<ParsedHeader> = None;
        for (done, name) in files.iter().enumerate() {
            let bytes = dir.read_file(name)?;
            let parsed = parse_file(name, &bytes)?;
            tracing::debug!(file = %name, nodes = parsed.nodes.len(), "parsed file");
            if self.config.is_header_file(name) {
                header = Some(ParsedHeader::from_parsed(&parsed));
            }
            merge_file(&mut graph, parsed)?;
            progress.report(ProgressStage::Parsing, done + 1, total);
        }

        let metadata = match (header, mode) {
            (Some(header), _) => header.into_metadata(&self.config.header_file)?,
            (None, LoadMode::Full) => {
                return Err(LoadError::MissingMetadata {
                    header: self.config.header_file.clone(),
                }
                .into())
            }
            (None, LoadMode::Fast) => CdmMetadata::default(),
        };

        if mode == LoadMode::Full {
            progress.report(ProgressStage::Resolving, 0, 1);
            let (live, broken) = graph.resolve_edges();
            graph.adopt_proxy_targets();
            progress.report(ProgressStage::Resolving, 1, 1);
            if broken > 0 {
                tracing::warn!(%location, broken, "CDM has broken references");
            }
            tracing::debug!(live, broken, "resolved edges");
        }

        tracing::info!(
            %location,
            nodes = graph.len(),
            version = metadata.version.as_deref().unwrap_or("unknown"),
            "loaded CDM"
        );
        Ok(CdmModel::from_parts(
            graph,
            metadata,
            mode,
            dir,
            self.config.clone(),
        ))
    }
}

/// Append one parsed file to the graph, shifting its local indices.
fn merge_file(graph: &mut ModelGraph, parsed: ParsedFile) -> Result<(), LoadError> {
    let base = graph.len() as u32;
    let shift = |id: NodeId| NodeId::new(id.raw() + base);
    let file_id = graph.push_file(CdmFile {
        name: parsed.name.clone(),
        xmi_version: parsed.xmi_version,
        namespaces: parsed.namespaces,
        root: NodeId::new(base),
    });

    for mut node in parsed.nodes {
        node.file = file_id;
        node.parent = node.parent.map(shift);
        for containment in &mut node.containments {
            if let Containment::Inline(child) = containment {
                *child = shift(*child);
            }
        }
        let uuid = node.id;
        if let Err(existing) = graph.insert_node(node) {
            return Err(LoadError::DuplicateIdentifier {
                id: cdm_uuid::to_canonical(&uuid),
                first_file: graph.file_name_of(existing).to_string(),
                second_file: parsed.name,
            });
        }
    }
    Ok(())
}

/// Version/prefix pairs declared by the header file.
struct ParsedHeader {
    pairs: BTreeSet<(String, String)>,
}

impl ParsedHeader {
    fn from_parsed(parsed: &ParsedFile) -> Self {
        let pairs = parsed
            .namespaces
            .iter()
            .filter_map(|(_, uri)| crate::schema::CdmNamespace::parse(uri))
            .map(|ns| (ns.version, ns.prefix))
            .collect();
        Self { pairs }
    }

    fn into_metadata(self, header: &str) -> Result<CdmMetadata, LoadError> {
        let mut pairs = self.pairs.into_iter();
        match (pairs.next(), pairs.next()) {
            (Some((version, prefix)), None) => Ok(CdmMetadata {
                version: Some(version),
                prefix: Some(prefix),
            }),
            (None, _) => Err(LoadError::InconsistentMetadata {
                header: header.to_string(),
                details: "no CDM namespace is declared".to_string(),
            }),
            (Some(first), Some(second)) => Err(LoadError::InconsistentMetadata {
                header: header.to_string(),
                details: format!(
                    "namespaces declare both {}{} and {}{}",
                    first.1, first.0, second.1, second.0
                ),
            }),
        }
    }
}
