//! The fixed table of known CDM versions.
//!
//! Versions are listed oldest first; a version's position in the table is
//! its generation, which orders conversion steps.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownVersion {
    pub version: &'static str,
    /// Canonical namespace prefix for this version.
    pub prefix: &'static str,
    /// Compatible EGS-CC release.
    pub egscc: &'static str,
    /// Compatible MCDE (CDM editor) version.
    pub mcde: &'static str,
}

const DME_PREFIX: &str = "http://www.esa.int/dme/";
const EGSCC_PREFIX: &str = "http://www.esa.int/egscc/";

pub const KNOWN_VERSIONS: &[KnownVersion] = &[
    KnownVersion {
        version: "1.10.1",
        prefix: DME_PREFIX,
        egscc: "pre-release (not compatible with any EGS-CC release)",
        mcde: "1.x",
    },
    KnownVersion {
        version: "1.12",
        prefix: DME_PREFIX,
        egscc: "EGS-CC release 1.0",
        mcde: "2.0",
    },
    KnownVersion {
        version: "1.12.1",
        prefix: DME_PREFIX,
        egscc: "EGS-CC release 1.1",
        mcde: "2.1",
    },
    KnownVersion {
        version: "1.13.0bd1",
        prefix: DME_PREFIX,
        egscc: "EGS-CC release 1.1 (beta drop)",
        mcde: "2.2",
    },
    KnownVersion {
        version: "1.14.0b",
        prefix: EGSCC_PREFIX,
        egscc: "EGS-CC release 2.0 (beta)",
        mcde: "2.3",
    },
    KnownVersion {
        version: "1.14.0",
        prefix: EGSCC_PREFIX,
        egscc: "EGS-CC release 2.0",
        mcde: "2.4",
    },
];

pub fn lookup_version(version: &str) -> Option<&'static KnownVersion> {
    KNOWN_VERSIONS.iter().find(|v| v.version == version)
}

pub fn version_position(version: &str) -> Option<usize> {
    KNOWN_VERSIONS.iter().position(|v| v.version == version)
}

pub fn known_versions() -> impl Iterator<Item = &'static str> {
    KNOWN_VERSIONS.iter().map(|v| v.version)
}

pub fn highest_known_version() -> &'static str {
    KNOWN_VERSIONS[KNOWN_VERSIONS.len() - 1].version
}

pub fn prefix_for_version(version: &str) -> Option<&'static str> {
    lookup_version(version).map(|v| v.prefix)
}

/// Whether `(version, prefix)` is a pair from the table.
pub fn is_consistent(version: &str, prefix: &str) -> bool {
    prefix_for_version(version) == Some(prefix)
}

fn compat(version: &str, prefix: &str, pick: fn(&KnownVersion) -> &'static str) -> String {
    match lookup_version(version) {
        None => format!("unknown (CDM version {version} is not known)"),
        Some(known) if known.prefix == prefix => pick(known).to_string(),
        Some(known) => format!(
            "none ({} would need prefix {}, but the CDM uses {})",
            pick(known),
            known.prefix,
            prefix
        ),
    }
}

pub fn compat_with_egscc(version: &str, prefix: &str) -> String {
    compat(version, prefix, |v| v.egscc)
}

pub fn compat_with_mcde(version: &str, prefix: &str) -> String {
    compat(version, prefix, |v| v.mcde)
}

/// Version information about a loaded CDM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CdmInfo {
    pub version: Option<String>,
    pub prefix: Option<String>,
    pub egscc_compatibility: String,
    pub mcde_compatibility: String,
}

impl CdmInfo {
    pub fn new(version: Option<&str>, prefix: Option<&str>) -> Self {
        let (egscc_compatibility, mcde_compatibility) = match (version, prefix) {
            (Some(v), Some(p)) => (compat_with_egscc(v, p), compat_with_mcde(v, p)),
            _ => ("unknown".to_string(), "unknown".to_string()),
        };
        Self {
            version: version.map(str::to_string),
            prefix: prefix.map(str::to_string),
            egscc_compatibility,
            mcde_compatibility,
        }
    }
}
