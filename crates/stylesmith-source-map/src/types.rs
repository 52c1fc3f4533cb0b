//! Core types for source maps

use serde::{Deserialize, Serialize};

/// The JSON shape of a version 3 source map
///
/// Unknown fields (such as `x_google_ignoreList`) are carried through
/// untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceMap {
    pub version: u32,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawSourceMap {
    /// Parse map JSON
    pub fn from_json(text: &str) -> crate::Result<Self> {
        let raw: RawSourceMap = serde_json::from_str(text)?;
        if raw.version != 3 {
            return Err(crate::SourceMapError::UnsupportedVersion(raw.version));
        }
        Ok(raw)
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> String {
        // Serializing plain strings and maps cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One mapping from a generated position to an (optional) original position
///
/// Lines are 1-based and columns are 0-based, the convention used by every
/// source map tool in the wild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source: Option<String>,
    pub original_line: u32,
    pub original_column: u32,
    pub name: Option<String>,
}

impl Mapping {
    /// A generated position with no original
    pub fn new(generated_line: u32, generated_column: u32) -> Self {
        Self {
            generated_line,
            generated_column,
            source: None,
            original_line: 0,
            original_column: 0,
            name: None,
        }
    }

    /// Attach an original position
    pub fn with_original(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(source.into());
        self.original_line = line;
        self.original_column = column;
        self
    }

    /// Attach a symbol name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub(crate) fn generated_key(&self) -> (u32, u32) {
        (self.generated_line, self.generated_column)
    }
}
