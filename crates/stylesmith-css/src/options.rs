//! Processing options
//!
//! These mirror the option object accepted by PostCSS-style processors, so
//! they can be read straight out of a JSON or YAML config file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options for one processing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptions {
    /// Absolute path of the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<PathBuf>,
    /// Absolute path the output will be written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapSetting>,
}

impl ProcessOptions {
    /// Names of the positional fields that are set, in `from`, `to` order
    pub fn positional_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.from.is_some() {
            fields.push("from");
        }
        if self.to.is_some() {
            fields.push("to");
        }
        fields
    }

    /// A copy with `from` and `to` replaced
    pub fn with_positions(&self, from: PathBuf, to: PathBuf) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..self.clone()
        }
    }

    /// Map options in effect, treating `true` and "unset" as all-defaults
    pub fn map_options(&self) -> MapOptions {
        match &self.map {
            Some(MapSetting::Options(options)) => options.clone(),
            _ => MapOptions::default(),
        }
    }

    /// Whether the caller explicitly asked for a map
    pub fn map_requested(&self) -> bool {
        match &self.map {
            Some(MapSetting::Bool(enabled)) => *enabled,
            Some(MapSetting::Options(_)) => true,
            None => false,
        }
    }
}

/// `map: true | false | { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapSetting {
    Bool(bool),
    Options(MapOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    /// Embed the map as a `data:` URI instead of emitting a separate map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<bool>,
    /// Map of the previous stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<PrevMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    /// Keep absolute paths in `sources` and the annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute: Option<bool>,
}

/// `prev: false | "<map json>"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrevMap {
    Flag(bool),
    Text(String),
}

impl PrevMap {
    /// `prev: false` turns off chaining entirely
    pub fn is_disabled(&self) -> bool {
        matches!(self, PrevMap::Flag(false))
    }
}

/// `annotation: true | false | "<path>"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Annotation {
    Flag(bool),
    Path(String),
}
