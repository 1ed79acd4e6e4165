//! Error kinds surfaced by the engine.
//!
//! Each kind is its own enum so callers can match on exactly the failures an
//! operation can produce; `CdmError` is the umbrella used at the controller
//! boundary.

use serde::Serialize;
use thiserror::Error;

pub use cdm_uuid::CodecError;

/// File content is not a recognized CDM model.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{file}: file content is not UTF-8 text")]
    NotUtf8 { file: String },

    #[error("{file}: malformed XML at byte {position}: {message}")]
    Malformed {
        file: String,
        position: usize,
        message: String,
    },

    #[error("{file}: the file is {format}, not an XML CDM file")]
    Foreign { file: String, format: String },

    #[error("{file}: document has no root element")]
    Empty { file: String },

    #[error("{file}: element <{tag}> carries data but has no xmi:id")]
    MissingIdentifier { file: String, tag: String },

    #[error("{file}: element <{tag}> has an invalid identifier: {source}")]
    InvalidIdentifier {
        file: String,
        tag: String,
        #[source]
        source: CodecError,
    },

    #[error("{file}: element <{tag}> has an invalid href `{href}`")]
    InvalidHref {
        file: String,
        tag: String,
        href: String,
    },

    #[error("{file}: unexpected content inside <{tag}>")]
    UnexpectedContent { file: String, tag: String },
}

/// The model could not be assembled from otherwise well-formed files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("identifier {id} is defined twice: in {first_file} and in {second_file}")]
    DuplicateIdentifier {
        id: String,
        first_file: String,
        second_file: String,
    },

    #[error("header file {header} is missing; cannot determine the CDM version and prefix")]
    MissingMetadata { header: String },

    #[error("header file {header} does not declare a consistent CDM version: {details}")]
    InconsistentMetadata { header: String, details: String },

    #[error("`{operation}` needs a fully loaded CDM, but it was loaded in fast mode")]
    NotFullyResolved { operation: &'static str },
}

/// A conversion target could not be accepted.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("CDM version {version} is not known")]
    UnknownVersion { version: String },

    #[error("prefix {prefix} does not belong to CDM version {version} (expected {expected})")]
    InconsistentPrefix {
        version: String,
        prefix: String,
        expected: String,
    },

    #[error("the current CDM version {current} is not known, so no conversion path can be planned")]
    UnknownSourceVersion { current: String },
}

/// Directory access failures.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot access {target}: {source}")]
    Access {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("destination {location} is not empty")]
    DestinationNotEmpty { location: String },
}

impl IoError {
    pub(crate) fn access(target: impl Into<String>, source: std::io::Error) -> Self {
        IoError::Access {
            target: target.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CdmErrorKind {
    Codec,
    Format,
    Load,
    Conversion,
    Io,
}

#[derive(Debug, Error)]
pub enum CdmError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Io(#[from] IoError),
}

impl CdmError {
    pub fn kind(&self) -> CdmErrorKind {
        match self {
            CdmError::Codec(_) => CdmErrorKind::Codec,
            CdmError::Format(_) => CdmErrorKind::Format,
            CdmError::Load(_) => CdmErrorKind::Load,
            CdmError::Conversion(_) => CdmErrorKind::Conversion,
            CdmError::Io(_) => CdmErrorKind::Io,
        }
    }
}

pub type Result<T, E = CdmError> = std::result::Result<T, E>;
