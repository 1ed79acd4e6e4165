//! CDM engine: load, validate, query, convert and save directory-based
//! CDM models.
//!
//! A CDM is a directory of XMI files (`*.cdm`). Each file holds one tree of
//! nodes; trees point into each other through `href` proxies (ownership)
//! and UUID references. A header file (`Manifest.cdm`) declares the CDM
//! version and namespace prefix through its namespace URIs.
//!
//! ## Module Organization
//!
//! - `parse` / `loader`: streaming XML parse and graph assembly
//! - `graph`: the node arena and its edges
//! - `validate`: structural checks producing a `ValidationReport`
//! - `query`: bitmap indices and the `NodeQuery` builder
//! - `convert`: version conversion with a fixed rewrite table
//! - `serialize`: deterministic XMI output
//! - `model`: `CdmModel` and the `CdmController` trait
//! - `templates` / `view`: creation from templates and text views
//!
//! ```no_run
//! use cdm_engine::{CdmController, CdmModel, FsDirectory, NoProgress};
//!
//! let model = CdmModel::load_full(Box::new(FsDirectory::new("my-cdm")), &NoProgress)?;
//! for id in model.find_by_name("Battery") {
//!     println!("{}", cdm_engine::describe_node(&model, id).unwrap_or_default());
//! }
//! # Ok::<(), cdm_engine::CdmError>(())
//! ```

pub mod config;
pub mod convert;
pub mod dir;
pub mod error;
pub mod graph;
pub mod loader;
pub mod model;
mod parse;
pub mod query;
pub mod schema;
pub mod serialize;
pub mod templates;
pub mod validate;
pub mod version;
pub mod view;

#[cfg(test)]
mod tests;

pub use cdm_uuid::{self, Uuid, UuidKind};
pub use config::EngineConfig;
pub use convert::{ConversionReport, ConversionRequest, DowngradePolicy, PrefixPolicy};
pub use dir::{
    CdmDirectory, FsDirectory, MemoryDirectory, NoProgress, ProgressSink, ProgressStage,
    TracingProgress,
};
pub use error::{
    CdmError, CdmErrorKind, CodecError, ConversionError, FormatError, IoError, LoadError, Result,
};
pub use graph::{
    Attribute, AttributeStyle, CdmFile, Containment, ContainmentProxy, EdgeTarget, FileId,
    GraphSnapshot, ModelGraph, Node, NodeId, Reference, ReferenceSpelling, Resolution,
};
pub use loader::{CdmLoader, LoadMode};
pub use model::{CdmController, CdmMetadata, CdmModel, ModelState};
pub use query::{NodeQuery, QueryIndex};
pub use templates::{create_cdm, templates, Template};
pub use validate::ValidationReport;
pub use version::{compat_with_egscc, compat_with_mcde, CdmInfo, KnownVersion};
pub use view::{describe_node, render_mce_tree};
