//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Layout conventions shared by the loader, the serializer and the templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extension (without dot, compared case-insensitively) of model files.
    pub file_extension: String,
    /// File that carries the version/prefix metadata.
    pub header_file: String,
    /// Indentation unit used when writing nested elements.
    pub indent: String,
    /// `xmi:version` written into files that do not carry one.
    pub xmi_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            file_extension: "cdm".to_string(),
            header_file: "Manifest.cdm".to_string(),
            indent: "  ".to_string(),
            xmi_version: "2.0".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config; missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Whether `file_name` is a model file under this config.
    pub fn is_model_file(&self, file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) => !stem.is_empty() && ext.eq_ignore_ascii_case(&self.file_extension),
            None => false,
        }
    }

    pub fn is_header_file(&self, file_name: &str) -> bool {
        file_name.eq_ignore_ascii_case(&self.header_file)
    }
}
