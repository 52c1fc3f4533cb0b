//! Building source maps and chaining them onto earlier stages

use crate::consumer::SourceMapConsumer;
use crate::types::{Mapping, RawSourceMap};
use crate::utils::join_url;
use crate::vlq;

/// Incrementally builds a version 3 source map
///
/// Mappings may be added in any order; they are sorted by generated
/// position when serialized.
#[derive(Debug, Clone, Default)]
pub struct SourceMapGenerator {
    file: Option<String>,
    mappings: Vec<Mapping>,
    /// Source path and its embedded text, in insertion order
    sources_content: Vec<(String, String)>,
}

impl SourceMapGenerator {
    pub fn new(file: Option<String>) -> Self {
        Self {
            file,
            mappings: Vec::new(),
            sources_content: Vec::new(),
        }
    }

    pub fn add_mapping(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Embed (or with `None`, forget) the text of a source
    pub fn set_source_content(&mut self, source: impl Into<String>, content: Option<String>) {
        let source = source.into();
        self.sources_content.retain(|(s, _)| *s != source);
        if let Some(content) = content {
            self.sources_content.push((source, content));
        }
    }

    /// Rewrite mappings that point into `source_file` so they point at what
    /// `consumer` says `source_file` came from.
    ///
    /// This is how a map for stage N is chained onto the map of stage N-1:
    /// `source_file` is the name stage N used for its input, and `consumer`
    /// is the map stage N-1 produced for that input. Sources taken from the
    /// consumer are joined onto `source_map_path` so they stay valid
    /// relative to this map. Mappings with no counterpart in the consumer are
    /// left pointing at `source_file`.
    pub fn apply_source_map(
        &mut self,
        consumer: &SourceMapConsumer,
        source_file: Option<&str>,
        source_map_path: Option<&str>,
    ) {
        let Some(source_file) = source_file.or(consumer.file()).map(str::to_string) else {
            return;
        };
        let rebase = |source: &str| match source_map_path {
            Some(path) => join_url(path, source),
            None => source.to_string(),
        };

        for mapping in &mut self.mappings {
            if mapping.source.as_deref() != Some(source_file.as_str()) {
                continue;
            }
            let Some(original) =
                consumer.original_position_for(mapping.original_line, mapping.original_column)
            else {
                continue;
            };
            mapping.source = Some(rebase(&original.source));
            mapping.original_line = original.line;
            mapping.original_column = original.column;
            if original.name.is_some() {
                mapping.name = original.name;
            }
        }

        for source in consumer.sources() {
            if let Some(content) = consumer.source_content_for(source) {
                self.set_source_content(rebase(source), Some(content.to_string()));
            }
        }
    }

    /// Serialize into the JSON shape
    pub fn to_raw(&self) -> RawSourceMap {
        let mut sources: Vec<String> = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for mapping in &self.mappings {
            if let Some(source) = &mapping.source {
                if !sources.contains(source) {
                    sources.push(source.clone());
                }
            }
            if let Some(name) = &mapping.name {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }

        let mut sorted: Vec<&Mapping> = self.mappings.iter().collect();
        sorted.sort_by_key(|m| m.generated_key());

        let mut encoded = String::new();
        let mut prev_line = 1u32;
        let mut prev_column = 0i64;
        let mut prev_source = 0i64;
        let mut prev_original_line = 0i64;
        let mut prev_original_column = 0i64;
        let mut prev_name = 0i64;
        let mut previous: Option<&Mapping> = None;

        for mapping in sorted {
            if mapping.generated_line != prev_line {
                for _ in prev_line..mapping.generated_line {
                    encoded.push(';');
                }
                prev_line = mapping.generated_line;
                prev_column = 0;
            } else if let Some(previous) = previous {
                if previous == mapping {
                    continue;
                }
                encoded.push(',');
            }

            let column = i64::from(mapping.generated_column);
            vlq::encode(column - prev_column, &mut encoded);
            prev_column = column;

            if let Some(source) = &mapping.source {
                let source_idx = index_of(&sources, source);
                vlq::encode(source_idx - prev_source, &mut encoded);
                prev_source = source_idx;

                let original_line = i64::from(mapping.original_line) - 1;
                vlq::encode(original_line - prev_original_line, &mut encoded);
                prev_original_line = original_line;

                let original_column = i64::from(mapping.original_column);
                vlq::encode(original_column - prev_original_column, &mut encoded);
                prev_original_column = original_column;

                if let Some(name) = &mapping.name {
                    let name_idx = index_of(&names, name);
                    vlq::encode(name_idx - prev_name, &mut encoded);
                    prev_name = name_idx;
                }
            }
            previous = Some(mapping);
        }

        let sources_content = if self.sources_content.is_empty() {
            None
        } else {
            Some(
                sources
                    .iter()
                    .map(|source| {
                        self.sources_content
                            .iter()
                            .find(|(s, _)| s == source)
                            .map(|(_, content)| content.clone())
                    })
                    .collect(),
            )
        };

        RawSourceMap {
            version: 3,
            sources,
            names,
            mappings: encoded,
            file: self.file.clone(),
            source_root: None,
            sources_content,
            extra: serde_json::Map::new(),
        }
    }

    pub fn to_json(&self) -> String {
        self.to_raw().to_json()
    }
}

fn index_of(list: &[String], value: &str) -> i64 {
    list.iter()
        .position(|v| v == value)
        .and_then(|idx| i64::try_from(idx).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_mappings_across_lines() {
        let mut generator = SourceMapGenerator::new(Some("a.css".into()));
        generator.add_mapping(Mapping::new(1, 0).with_original("a.scss", 1, 0));
        generator.add_mapping(Mapping::new(2, 2).with_original("a.scss", 2, 2));
        generator.add_mapping(Mapping::new(2, 9).with_original("a.scss", 2, 9));

        let raw = generator.to_raw();
        assert_eq!(raw.mappings, "AAAA;EACE,OAAO");
        assert_eq!(raw.file.as_deref(), Some("a.css"));
        assert_eq!(raw.sources_content, None);
    }

    #[test]
    fn test_serialized_shape() {
        let mut generator = SourceMapGenerator::new(Some("a.css".into()));
        generator.add_mapping(Mapping::new(1, 0).with_original("a.scss", 1, 0));
        generator.add_mapping(Mapping::new(2, 2).with_original("a.scss", 2, 2).with_name("color"));
        generator.set_source_content("a.scss", Some("a\n  color: red".into()));

        insta::assert_snapshot!(
            generator.to_json(),
            @r#"{"version":3,"sources":["a.scss"],"names":["color"],"mappings":"AAAA;EACEA","file":"a.css","sourcesContent":["a\n  color: red"]}"#
        );
    }

    #[test]
    fn test_generated_map_decodes_back() {
        let mut generator = SourceMapGenerator::new(None);
        generator.add_mapping(Mapping::new(3, 4).with_original("x.css", 7, 1).with_name("color"));
        generator.add_mapping(Mapping::new(1, 0).with_original("y.css", 1, 0));
        generator.set_source_content("x.css", Some("x".into()));

        let consumer = SourceMapConsumer::from_json(&generator.to_json()).unwrap();
        let pos = consumer.original_position_for(3, 4).unwrap();
        assert_eq!(pos.source, "x.css");
        assert_eq!((pos.line, pos.column), (7, 1));
        assert_eq!(pos.name.as_deref(), Some("color"));
        assert_eq!(consumer.source_content_for("x.css"), Some("x"));
        assert_eq!(consumer.source_content_for("y.css"), None);
    }

    #[test]
    fn test_apply_source_map_chains_to_original_source() {
        // Stage 1: a.sass -> a.css
        let mut stage1 = SourceMapGenerator::new(Some("a.css".into()));
        stage1.add_mapping(Mapping::new(1, 0).with_original("a.sass", 1, 0));
        stage1.add_mapping(Mapping::new(1, 4).with_original("a.sass", 2, 2));
        stage1.set_source_content("a.sass", Some("a\n  color: black\n".into()));
        let previous = SourceMapConsumer::from_json(&stage1.to_json()).unwrap();

        // Stage 2: ../src/a.css -> a.css
        let mut stage2 = SourceMapGenerator::new(Some("a.css".into()));
        stage2.add_mapping(Mapping::new(1, 0).with_original("../src/a.css", 1, 0));
        stage2.add_mapping(Mapping::new(1, 4).with_original("../src/a.css", 1, 4));
        stage2.add_mapping(Mapping::new(1, 18).with_original("../src/a.css", 1, 4));
        stage2.set_source_content("../src/a.css", Some("a { color: black }".into()));

        stage2.apply_source_map(&previous, Some("../src/a.css"), Some("../src"));
        let raw = stage2.to_raw();

        assert_eq!(raw.sources, vec!["../src/a.sass".to_string()]);
        assert_eq!(
            raw.sources_content,
            Some(vec![Some("a\n  color: black\n".to_string())])
        );
        let chained = SourceMapConsumer::from_json(&raw.to_json()).unwrap();
        let pos = chained.original_position_for(1, 18).unwrap();
        assert_eq!((pos.line, pos.column), (2, 2));
    }

    #[test]
    fn test_apply_source_map_keeps_unmapped_positions() {
        let mut stage1 = SourceMapGenerator::new(Some("a.css".into()));
        stage1.add_mapping(Mapping::new(1, 5).with_original("a.sass", 1, 0));
        let previous = SourceMapConsumer::from_json(&stage1.to_json()).unwrap();

        let mut stage2 = SourceMapGenerator::new(None);
        stage2.add_mapping(Mapping::new(1, 0).with_original("a.css", 1, 0));
        stage2.apply_source_map(&previous, Some("a.css"), None);

        assert_eq!(stage2.to_raw().sources, vec!["a.css".to_string()]);
    }
}
