//! `CdmModel`: a loaded CDM and the controller operations over it.

use crate::config::EngineConfig;
use crate::convert::{self, ConversionReport, ConversionRequest};
use crate::dir::{CdmDirectory, NoProgress, ProgressSink};
use crate::error::{IoError, LoadError, Result};
use crate::graph::{ModelGraph, Node, NodeId};
use crate::loader::{CdmLoader, LoadMode};
use crate::query::{NodeQuery, QueryIndex};
use crate::serialize;
use crate::validate::{self, ValidationReport};
use crate::version::CdmInfo;
use serde::Serialize;
use std::sync::OnceLock;

/// Version and prefix read from the header file (absent in a fast load
/// without header).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CdmMetadata {
    pub version: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Loaded,
    Converted,
}

/// Operations every CDM front end relies on.
pub trait CdmController {
    fn load_fast(dir: Box<dyn CdmDirectory>, progress: &dyn ProgressSink) -> Result<Self>
    where
        Self: Sized;

    fn load_full(dir: Box<dyn CdmDirectory>, progress: &dyn ProgressSink) -> Result<Self>
    where
        Self: Sized;

    fn version(&self) -> Option<&str>;

    fn prefix(&self) -> Option<&str>;

    fn node(&self, id: NodeId) -> Option<&Node>;

    /// Accepts canonical or compact spelling.
    fn find_by_identifier(&self, id: &str) -> Result<Option<NodeId>>;

    fn find_by_name(&self, name: &str) -> Vec<NodeId>;

    fn find_by_type(&self, declared_type: &str) -> Vec<NodeId>;

    fn find_by_tag(&self, tag: &str) -> Vec<NodeId>;

    /// MCE roots. Needs a full load.
    fn tree_roots(&self) -> Result<Vec<NodeId>>;

    fn mce_children(&self, id: NodeId) -> Vec<NodeId>;

    fn check_validity(&self) -> ValidationReport;

    fn convert_to(&mut self, version: &str, prefix: Option<&str>) -> Result<ConversionReport>;

    /// Write every file back to the directory the model was loaded from.
    fn save(&self) -> Result<()>;

    /// Write every file into `dest`, which must be empty unless it is the
    /// source directory.
    fn save_to(&self, dest: &dyn CdmDirectory) -> Result<()>;
}

#[derive(Debug)]
pub struct CdmModel {
    graph: ModelGraph,
    metadata: CdmMetadata,
    mode: LoadMode,
    source: Box<dyn CdmDirectory>,
    config: EngineConfig,
    index: OnceLock<QueryIndex>,
    state: ModelState,
}

impl CdmModel {
    pub(crate) fn from_parts(
        graph: ModelGraph,
        metadata: CdmMetadata,
        mode: LoadMode,
        source: Box<dyn CdmDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            graph,
            metadata,
            mode,
            source,
            config,
            index: OnceLock::new(),
            state: ModelState::Loaded,
        }
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    /// Mutable graph access; drops the query index.
    fn graph_mut(&mut self) -> &mut ModelGraph {
        self.index.take();
        &mut self.graph
    }

    pub fn metadata(&self) -> &CdmMetadata {
        &self.metadata
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &dyn CdmDirectory {
        self.source.as_ref()
    }

    pub fn index(&self) -> &QueryIndex {
        self.index.get_or_init(|| QueryIndex::build(&self.graph))
    }

    pub fn query(&self, query: &NodeQuery) -> Vec<NodeId> {
        query.run(self.index())
    }

    pub fn info(&self) -> CdmInfo {
        CdmInfo::new(self.metadata.version.as_deref(), self.metadata.prefix.as_deref())
    }

    /// Set `name` on every MCE root. Returns how many were renamed.
    pub fn rename_mce_roots(&mut self, name: &str) -> Result<usize> {
        let roots = self.tree_roots()?;
        let graph = self.graph_mut();
        for root in &roots {
            if let Some(node) = graph.node_mut(*root) {
                node.set_attribute(crate::schema::ATTR_NAME, name);
            }
        }
        tracing::info!(renamed = roots.len(), %name, "renamed MCE roots");
        Ok(roots.len())
    }

    /// Returns false when the node does not exist.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        match self.graph_mut().node_mut(id) {
            Some(node) => {
                node.set_attribute(name, value);
                true
            }
            None => false,
        }
    }

    pub fn convert(&mut self, request: &ConversionRequest) -> Result<ConversionReport> {
        self.index.take();
        let report = convert::convert(&mut self.graph, &mut self.metadata, request)?;
        if !report.no_op {
            self.state = ModelState::Converted;
        }
        Ok(report)
    }

    /// `save_to` with progress reporting.
    pub fn save_to_with_progress(
        &self,
        dest: &dyn CdmDirectory,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let location = dest.location();
        if location != self.source.location() && !dest.is_empty()? {
            return Err(IoError::DestinationNotEmpty { location }.into());
        }
        serialize::write_all(&self.graph, &self.config, dest, progress)?;
        Ok(())
    }
}

impl CdmController for CdmModel {
    fn load_fast(dir: Box<dyn CdmDirectory>, progress: &dyn ProgressSink) -> Result<Self> {
        CdmLoader::default().load_fast(dir, progress)
    }

    fn load_full(dir: Box<dyn CdmDirectory>, progress: &dyn ProgressSink) -> Result<Self> {
        CdmLoader::default().load_full(dir, progress)
    }

    fn version(&self) -> Option<&str> {
        self.metadata.version.as_deref()
    }

    fn prefix(&self) -> Option<&str> {
        self.metadata.prefix.as_deref()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    fn find_by_identifier(&self, id: &str) -> Result<Option<NodeId>> {
        let uuid = cdm_uuid::parse(id)?;
        Ok(self.graph.lookup(&uuid))
    }

    fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        self.index().find_by_name(name)
    }

    fn find_by_type(&self, declared_type: &str) -> Vec<NodeId> {
        self.index().find_by_type(declared_type)
    }

    fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.index().find_by_tag(tag)
    }

    fn tree_roots(&self) -> Result<Vec<NodeId>> {
        match self.mode {
            LoadMode::Full => Ok(self.graph.mce_roots()),
            LoadMode::Fast => Err(LoadError::NotFullyResolved {
                operation: "tree_roots",
            }
            .into()),
        }
    }

    fn mce_children(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.mce_children(id)
    }

    fn check_validity(&self) -> ValidationReport {
        validate::validate(&self.graph, &self.metadata)
    }

    fn convert_to(&mut self, version: &str, prefix: Option<&str>) -> Result<ConversionReport> {
        let mut request = ConversionRequest::to_version(version);
        if let Some(prefix) = prefix {
            request = request.with_prefix(prefix);
        }
        self.convert(&request)
    }

    fn save(&self) -> Result<()> {
        serialize::write_all(&self.graph, &self.config, self.source.as_ref(), &NoProgress)?;
        Ok(())
    }

    fn save_to(&self, dest: &dyn CdmDirectory) -> Result<()> {
        self.save_to_with_progress(dest, &NoProgress)
    }
}
