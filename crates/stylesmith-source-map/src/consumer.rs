//! Reading source maps and looking up original positions

use crate::error::{Result, SourceMapError};
use crate::types::{Mapping, RawSourceMap};
use crate::utils::join_url;
use crate::vlq;

/// The original location a generated position maps back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    /// 1-based
    pub line: u32,
    /// 0-based
    pub column: u32,
    pub name: Option<String>,
}

/// A decoded, queryable source map
#[derive(Debug, Clone)]
pub struct SourceMapConsumer {
    file: Option<String>,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    /// Sorted by generated position
    mappings: Vec<Mapping>,
}

impl SourceMapConsumer {
    /// Parse and decode map JSON
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_raw(RawSourceMap::from_json(text)?)
    }

    /// Decode an already-parsed map
    ///
    /// Sources are resolved against `sourceRoot` when one is present.
    pub fn from_raw(raw: RawSourceMap) -> Result<Self> {
        let sources: Vec<String> = match &raw.source_root {
            Some(root) if !root.is_empty() => {
                raw.sources.iter().map(|s| join_url(root, s)).collect()
            }
            _ => raw.sources.clone(),
        };
        let mut sources_content = raw.sources_content.clone().unwrap_or_default();
        sources_content.resize(sources.len(), None);

        let mappings = decode_mappings(&raw.mappings, &sources, &raw.names)?;

        Ok(Self {
            file: raw.file,
            sources,
            sources_content,
            mappings,
        })
    }

    /// The `file` field of the map
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Resolved source paths, in map order
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// All decoded mappings, ordered by generated position
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Whether the map embeds the text of at least one source
    pub fn has_contents_of_all_sources(&self) -> bool {
        !self.sources.is_empty() && self.sources_content.iter().all(Option::is_some)
    }

    /// Whether the map embeds the text of any source
    pub fn has_any_source_content(&self) -> bool {
        self.sources_content.iter().any(Option::is_some)
    }

    /// Embedded text of `source`, if present
    pub fn source_content_for(&self, source: &str) -> Option<&str> {
        self.sources
            .iter()
            .position(|s| s == source)
            .and_then(|idx| self.sources_content.get(idx))
            .and_then(|content| content.as_deref())
    }

    /// Drop all embedded source text
    pub fn without_sources_content(mut self) -> Self {
        self.sources_content = vec![None; self.sources.len()];
        self
    }

    /// Find the original position for a generated position
    ///
    /// Uses the closest mapping at or before `column` on the same generated
    /// line. Returns `None` when that mapping has no original, or when the
    /// line has no mapping at or before the column.
    pub fn original_position_for(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        let idx = self
            .mappings
            .partition_point(|m| m.generated_key() <= (line, column));
        if idx == 0 {
            return None;
        }
        let mapping = &self.mappings[idx - 1];
        if mapping.generated_line != line {
            return None;
        }
        let source = mapping.source.clone()?;
        Some(OriginalPosition {
            source,
            line: mapping.original_line,
            column: mapping.original_column,
            name: mapping.name.clone(),
        })
    }
}

fn lookup(table: &[String], index: i64, what: &str) -> Result<String> {
    usize::try_from(index)
        .ok()
        .and_then(|i| table.get(i))
        .cloned()
        .ok_or_else(|| SourceMapError::InvalidVlq(format!("{} index {} out of range", what, index)))
}

fn decode_mappings(mappings: &str, sources: &[String], names: &[String]) -> Result<Vec<Mapping>> {
    let mut decoded = Vec::new();

    let mut source_idx = 0i64;
    let mut original_line = 0i64;
    let mut original_column = 0i64;
    let mut name_idx = 0i64;

    for (line_idx, line) in mappings.split(';').enumerate() {
        let generated_line = u32::try_from(line_idx + 1)
            .map_err(|_| SourceMapError::InvalidVlq("too many lines".to_string()))?;
        let mut generated_column = 0i64;

        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = vlq::decode_segment(segment)?;
            generated_column += fields[0];

            let mut mapping = Mapping::new(generated_line, clamp(generated_column)?);
            if fields.len() >= 4 {
                source_idx += fields[1];
                original_line += fields[2];
                original_column += fields[3];
                mapping.source = Some(lookup(sources, source_idx, "source")?);
                // Stored 0-based in the encoding, exposed 1-based
                mapping.original_line = clamp(original_line + 1)?;
                mapping.original_column = clamp(original_column)?;
            }
            if fields.len() == 5 {
                name_idx += fields[4];
                mapping.name = Some(lookup(names, name_idx, "name")?);
            }
            decoded.push(mapping);
        }
    }

    decoded.sort_by_key(Mapping::generated_key);
    Ok(decoded)
}

fn clamp(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| SourceMapError::InvalidVlq(format!("negative or huge position {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SASS_MAP: &str = r#"{
        "version": 3,
        "file": "a.css",
        "sources": ["a.sass"],
        "sourcesContent": ["a\n  color: black\n"],
        "names": [],
        "mappings": "AAAA;EACE"
    }"#;

    #[test]
    fn test_decodes_positions() {
        let consumer = SourceMapConsumer::from_json(SASS_MAP).unwrap();
        assert_eq!(consumer.mappings().len(), 2);

        let pos = consumer.original_position_for(1, 0).unwrap();
        assert_eq!(pos.source, "a.sass");
        assert_eq!((pos.line, pos.column), (1, 0));

        let pos = consumer.original_position_for(2, 2).unwrap();
        assert_eq!((pos.line, pos.column), (2, 2));
    }

    #[test]
    fn test_lookup_uses_greatest_lower_bound_on_same_line() {
        let consumer = SourceMapConsumer::from_json(SASS_MAP).unwrap();
        let pos = consumer.original_position_for(2, 10).unwrap();
        assert_eq!((pos.line, pos.column), (2, 2));
        assert!(consumer.original_position_for(2, 1).is_none());
        assert!(consumer.original_position_for(5, 0).is_none());
    }

    #[test]
    fn test_source_root_is_applied() {
        let text = r#"{"version":3,"sourceRoot":"../lib","sources":["a.sass"],"names":[],"mappings":"AAAA"}"#;
        let consumer = SourceMapConsumer::from_json(text).unwrap();
        assert_eq!(consumer.sources(), &["../lib/a.sass".to_string()]);
        assert_eq!(
            consumer.original_position_for(1, 0).unwrap().source,
            "../lib/a.sass"
        );
    }

    #[test]
    fn test_source_content() {
        let consumer = SourceMapConsumer::from_json(SASS_MAP).unwrap();
        assert!(consumer.has_contents_of_all_sources());
        assert_eq!(
            consumer.source_content_for("a.sass"),
            Some("a\n  color: black\n")
        );
        let stripped = consumer.without_sources_content();
        assert!(!stripped.has_any_source_content());
    }

    #[test]
    fn test_out_of_range_source_index_is_an_error() {
        let text = r#"{"version":3,"sources":[],"names":[],"mappings":"AAAA"}"#;
        assert!(SourceMapConsumer::from_json(text).is_err());
    }
}
