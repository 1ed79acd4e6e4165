//! Fixed schema knowledge: well-known namespaces and types, containment
//! features, default types per tag, and required attributes per type.
//!
//! CDM files are XMI documents. The engine does not read the metamodel; the
//! little it needs to know about the schema lives in the tables below.

use crate::version::version_position;

pub const XMI_NAMESPACE: &str = "http://www.omg.org/XMI";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const ECORE_NAMESPACE: &str = "http://www.eclipse.org/emf/2002/Ecore";

pub const ATTR_XMI_ID: &str = "xmi:id";
pub const ATTR_XMI_VERSION: &str = "xmi:version";
pub const ATTR_XSI_TYPE: &str = "xsi:type";
pub const ATTR_HREF: &str = "href";
pub const ATTR_NAME: &str = "name";

/// First bytes of an EMF binary resource (`\x89emf\n\r\x1a\n`).
pub const EMF_BINARY_SIGNATURE: [u8; 8] = [0x89, b'e', b'm', b'f', b'\n', b'\r', 0x1a, b'\n'];

pub const MCE_TYPE: &str = "monitoringcontrol:MonitoringControlElement";
pub const MCE_DEFINITION_TYPE: &str = "monitoringcontrol:MonitoringControlElementDefinition";
pub const ACTIVITY_TYPE: &str = "monitoringcontrol:Activity";
pub const PARAMETER_TYPE: &str = "monitoringcontrol:Parameter";
pub const EVENT_TYPE: &str = "monitoringcontrol:Event";
pub const MCM_CI_TYPE: &str = "configurationcontrol:McmCI";
pub const MANIFEST_TYPE: &str = "configurationcontrol:Manifest";

/// Child-element features that own their target. An `href` child with one
/// of these tags is a containment proxy rather than a reference.
const CONTAINMENT_FEATURES: &[&str] = &[
    "monitoringControlElement",
    "subElements",
    "subMonitoringControlElements",
    "definition",
    "activities",
    "parameters",
    "events",
];

pub fn is_containment_feature(tag: &str) -> bool {
    CONTAINMENT_FEATURES.contains(&tag)
}

/// Attribute roles whose value is a list of `href` tokens. Any other
/// attribute is plain text, even when it happens to spell an identifier.
const REFERENCE_ATTRIBUTES: &[&str] = &["defaultRoute", "defaultServiceAccessPoint"];

pub fn is_reference_attribute(name: &str) -> bool {
    REFERENCE_ATTRIBUTES.contains(&name)
}

/// Declared type of an element that carries no `xsi:type`.
pub fn default_type_for_tag(tag: &str) -> Option<&'static str> {
    match tag {
        "monitoringControlElement" | "subElements" | "subMonitoringControlElements" => {
            Some(MCE_TYPE)
        }
        "definition" => Some(MCE_DEFINITION_TYPE),
        "activities" => Some(ACTIVITY_TYPE),
        "parameters" => Some(PARAMETER_TYPE),
        "events" => Some(EVENT_TYPE),
        _ => None,
    }
}

/// An attribute a node of `declared_type` must carry, optionally only from
/// CDM version `since` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredAttribute {
    pub declared_type: &'static str,
    pub attribute: &'static str,
    pub since: Option<&'static str>,
}

pub const REQUIRED_ATTRIBUTES: &[RequiredAttribute] = &[
    RequiredAttribute {
        declared_type: MCE_TYPE,
        attribute: ATTR_NAME,
        since: None,
    },
    RequiredAttribute {
        declared_type: MCE_DEFINITION_TYPE,
        attribute: ATTR_NAME,
        since: None,
    },
    RequiredAttribute {
        declared_type: ACTIVITY_TYPE,
        attribute: ATTR_NAME,
        since: None,
    },
    RequiredAttribute {
        declared_type: ACTIVITY_TYPE,
        attribute: "executable",
        since: Some("1.13.0bd1"),
    },
    RequiredAttribute {
        declared_type: PARAMETER_TYPE,
        attribute: ATTR_NAME,
        since: None,
    },
    RequiredAttribute {
        declared_type: EVENT_TYPE,
        attribute: ATTR_NAME,
        since: None,
    },
    RequiredAttribute {
        declared_type: MCM_CI_TYPE,
        attribute: ATTR_NAME,
        since: None,
    },
];

/// Rules in force for `declared_type` at `version` (unknown versions only get
/// the unconditional rules).
pub fn required_attributes_for<'a>(
    declared_type: &'a str,
    version: Option<&'a str>,
) -> impl Iterator<Item = &'static RequiredAttribute> + 'a {
    let current = version.and_then(version_position);
    REQUIRED_ATTRIBUTES.iter().filter(move |rule| {
        if rule.declared_type != declared_type {
            return false;
        }
        match rule.since {
            None => true,
            Some(since) => match (current, version_position(since)) {
                (Some(current), Some(since)) => current >= since,
                _ => false,
            },
        }
    })
}

// ============================================================================
// Namespaces
// ============================================================================

/// A CDM package namespace, `{prefix}{package}/{version}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdmNamespace {
    pub prefix: String,
    pub package: String,
    pub version: String,
}

impl CdmNamespace {
    pub fn parse(uri: &str) -> Option<Self> {
        if matches!(uri, XMI_NAMESPACE | XSI_NAMESPACE | ECORE_NAMESPACE) {
            return None;
        }
        let (head, version) = uri.rsplit_once('/')?;
        let (prefix, package) = head.rsplit_once('/')?;
        let starts_with_digit = version.chars().next().is_some_and(|c| c.is_ascii_digit());
        let package_ok = package.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if !starts_with_digit || !package_ok || prefix.is_empty() {
            return None;
        }
        Some(Self {
            prefix: format!("{prefix}/"),
            package: package.to_string(),
            version: version.to_string(),
        })
    }

    pub fn uri(&self) -> String {
        format!("{}{}/{}", self.prefix, self.package, self.version)
    }
}

/// Namespace URI for `package` at a given prefix/version.
pub fn namespace_uri(prefix: &str, package: &str, version: &str) -> String {
    format!("{prefix}{package}/{version}")
}
