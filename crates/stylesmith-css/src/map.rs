//! Source maps for processed stylesheets
//!
//! [`PreviousMap`] finds the map of the stage that produced the input, and
//! [`MapGenerator`] stringifies the final tree while recording a mapping for
//! every node, chaining the previous map on top when there is one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stylesmith_source_map::utils::{has_url_scheme, normalize_path};
use stylesmith_source_map::{
    Mapping, SourceMapConsumer, SourceMapGenerator, decode_inline_map, encode_inline_map,
    find_annotation, is_data_url,
};

use crate::error::Result;
use crate::node::{Input, Stylesheet};
use crate::options::{Annotation, MapOptions, MapSetting, PrevMap, ProcessOptions};
use crate::stringifier::{Edge, stringify, stringify_with};

const NO_SOURCE: &str = "<input css>";

/// The map of the previous processing stage
#[derive(Debug, Clone)]
pub struct PreviousMap {
    pub text: String,
    /// Whether the input embedded the map as a `data:` URI
    pub inline: bool,
    /// The annotation found in the input, if any
    pub annotation: Option<String>,
    /// The input path; the previous map's sources are relative to its directory
    pub from: Option<PathBuf>,
}

impl PreviousMap {
    /// Find the previous map for `css`
    ///
    /// An explicit `map.prev` text wins, `map.prev: false` disables lookup,
    /// and otherwise an inline annotation in the input is decoded. Maps that
    /// live in their own file are never read here; the caller passes them as
    /// `prev`.
    pub fn load(css: &str, opts: &ProcessOptions) -> Result<Option<Self>> {
        let annotation = find_annotation(css).map(|m| m.url);
        let inline = annotation.as_deref().is_some_and(is_data_url);

        let text = match opts.map_options().prev {
            Some(prev) if prev.is_disabled() => return Ok(None),
            Some(PrevMap::Text(text)) => Some(text),
            _ => match &annotation {
                Some(url) if inline => Some(decode_inline_map(url)?),
                _ => None,
            },
        };

        Ok(text.map(|text| Self {
            text,
            inline,
            annotation,
            from: opts.from.clone(),
        }))
    }

    pub fn consumer(&self) -> Result<SourceMapConsumer> {
        Ok(SourceMapConsumer::from_json(&self.text)?)
    }

    /// Whether the map embeds any source text
    pub fn with_content(&self) -> bool {
        self.consumer()
            .map(|c| c.has_any_source_content())
            .unwrap_or(false)
    }
}

/// Stringifies a tree and builds its map
pub struct MapGenerator<'a> {
    root: &'a mut Stylesheet,
    opts: &'a ProcessOptions,
    map_opts: MapOptions,
    previous: Option<PreviousMap>,
}

impl<'a> MapGenerator<'a> {
    pub fn new(
        root: &'a mut Stylesheet,
        opts: &'a ProcessOptions,
        previous: Option<PreviousMap>,
    ) -> Self {
        Self {
            root,
            map_opts: opts.map_options(),
            opts,
            previous,
        }
    }

    /// Produce the output text and, for a map kept outside the text, the
    /// map JSON.
    pub fn generate(mut self) -> Result<(String, Option<String>)> {
        self.clear_annotation();
        if self.is_map() {
            self.generate_map()
        } else {
            Ok((stringify(self.root), None))
        }
    }

    /// Drop stale annotations; a new one is appended when a map is written
    fn clear_annotation(&mut self) {
        if self.map_opts.annotation == Some(Annotation::Flag(false)) {
            return;
        }
        self.root.remove_source_map_annotations();
    }

    fn is_map(&self) -> bool {
        match &self.opts.map {
            Some(MapSetting::Bool(enabled)) => *enabled,
            Some(MapSetting::Options(_)) => true,
            None => self.previous.is_some(),
        }
    }

    fn is_inline(&self) -> bool {
        if let Some(inline) = self.map_opts.inline {
            return inline;
        }
        match &self.map_opts.annotation {
            None | Some(Annotation::Flag(true)) => {}
            Some(_) => return false,
        }
        match &self.previous {
            Some(prev) => prev.inline,
            None => true,
        }
    }

    fn is_annotation(&self) -> bool {
        if self.is_inline() {
            return true;
        }
        match &self.map_opts.annotation {
            Some(Annotation::Flag(flag)) => *flag,
            Some(Annotation::Path(_)) => true,
            None => match &self.previous {
                Some(prev) => prev.annotation.is_some(),
                None => true,
            },
        }
    }

    fn is_sources_content(&self) -> bool {
        if let Some(sources_content) = self.map_opts.sources_content {
            return sources_content;
        }
        match &self.previous {
            Some(prev) => prev.with_content(),
            None => true,
        }
    }

    fn generate_map(self) -> Result<(String, Option<String>)> {
        let mut generator = SourceMapGenerator::new(Some(self.output_file()));
        let mut css = String::new();
        let mut line = 1u32;
        let mut column = 0u32;

        let this = &self;
        stringify_with(&*this.root, |text, anchor| {
            if let Some((source, edge)) = anchor {
                let position = match edge {
                    Edge::Start => Some(source.start),
                    Edge::End => source.end,
                };
                if let Some(position) = position {
                    generator.add_mapping(Mapping::new(line, column).with_original(
                        this.source_path(&source.input),
                        to_u32(position.line),
                        to_u32(position.column.saturating_sub(1)),
                    ));
                }
            }

            css.push_str(text);
            match text.rfind('\n') {
                Some(last) => {
                    line += to_u32(text.matches('\n').count());
                    column = to_u32(text[last + 1..].chars().count());
                }
                None => column += to_u32(text.chars().count()),
            }
        });

        if self.is_sources_content() {
            self.set_sources_content(&mut generator);
        }
        self.apply_prev_maps(&mut generator)?;

        let map = generator.to_json();
        if self.is_annotation() {
            let content = if self.is_inline() {
                encode_inline_map(&map)
            } else if let Some(Annotation::Path(path)) = &self.map_opts.annotation {
                path.clone()
            } else {
                format!("{}.map", self.output_file())
            };
            let eol = if css.contains("\r\n") { "\r\n" } else { "\n" };
            css.push_str(eol);
            css.push_str("/*# sourceMappingURL=");
            css.push_str(&content);
            css.push_str(" */");
        }

        if self.is_inline() {
            Ok((css, None))
        } else {
            Ok((css, Some(map)))
        }
    }

    fn set_sources_content(&self, generator: &mut SourceMapGenerator) {
        let mut inputs: Vec<Arc<Input>> = Vec::new();
        self.root.walk(|node| {
            if let Some(source) = node.source() {
                if !inputs.iter().any(|seen| Arc::ptr_eq(seen, &source.input)) {
                    inputs.push(Arc::clone(&source.input));
                }
            }
        });
        for input in inputs {
            generator.set_source_content(self.source_path(&input), Some(input.css.clone()));
        }
    }

    fn apply_prev_maps(&self, generator: &mut SourceMapGenerator) -> Result<()> {
        let Some(prev) = &self.previous else {
            return Ok(());
        };
        let mut consumer = prev.consumer()?;
        if self.map_opts.sources_content == Some(false) {
            consumer = consumer.without_sources_content();
        }
        let from = prev.from.as_deref().map(|f| to_url(&self.path(f)));
        let root = prev
            .from
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| to_url(&self.path(dir)));
        generator.apply_source_map(&consumer, from.as_deref(), root.as_deref());
        Ok(())
    }

    /// Name of a node's input as it appears in `sources`
    fn source_path(&self, input: &Input) -> String {
        match &input.file {
            Some(file) if self.map_opts.absolute == Some(true) => to_url(&file.to_string_lossy()),
            Some(file) => to_url(&self.path(file)),
            None => NO_SOURCE.to_string(),
        }
    }

    /// The map's `file` field
    fn output_file(&self) -> String {
        match (&self.opts.to, &self.opts.from) {
            (Some(to), _) => to_url(&self.path(to)),
            (None, Some(from)) => to_url(&self.path(from)),
            (None, None) => "to.css".to_string(),
        }
    }

    /// Directory the map will be written to
    fn map_dir(&self) -> PathBuf {
        let dir = self
            .opts
            .to
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        match &self.map_opts.annotation {
            Some(Annotation::Path(annotation)) => normalize_path(&dir.join(annotation))
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            _ => dir,
        }
    }

    /// `file` relative to the map directory
    fn path(&self, file: &Path) -> String {
        let text = file.to_string_lossy();
        if self.map_opts.absolute == Some(true) || text.starts_with('<') || has_url_scheme(&text) {
            return text.into_owned();
        }
        let dir = self.map_dir();
        pathdiff::diff_paths(file, &dir)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| text.into_owned())
    }
}

fn to_url(path: &str) -> String {
    path.replace('\\', "/")
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use stylesmith_source_map::RawSourceMap;

    fn opts(map: Option<MapSetting>) -> ProcessOptions {
        ProcessOptions {
            from: Some("/site/src/a.css".into()),
            to: Some("/site/build/a.css".into()),
            map,
        }
    }

    fn run(css: &str, opts: &ProcessOptions) -> (String, Option<String>) {
        let input = Arc::new(Input {
            css: css.to_string(),
            file: opts.from.clone(),
        });
        let mut root = parse(input).unwrap();
        let previous = PreviousMap::load(css, opts).unwrap();
        MapGenerator::new(&mut root, opts, previous)
            .generate()
            .unwrap()
    }

    #[test]
    fn test_no_map_by_default() {
        let (css, map) = run("a { color: black }", &opts(None));
        assert_eq!(css, "a { color: black }");
        assert!(map.is_none());
    }

    #[test]
    fn test_map_disabled_strips_stale_annotation() {
        let (css, map) = run(
            "a { color: black }\n/*# sourceMappingURL=old.map */",
            &opts(Some(MapSetting::Bool(false))),
        );
        assert_eq!(css, "a { color: black }");
        assert!(map.is_none());
    }

    #[test]
    fn test_inline_map_by_default() {
        let (css, map) = run("a { color: black }", &opts(Some(MapSetting::Bool(true))));
        assert!(map.is_none());
        assert!(css.starts_with("a { color: black }\n/*# sourceMappingURL=data:application/json;base64,"));
    }

    #[test]
    fn test_external_map() {
        let opts = opts(Some(MapSetting::Options(MapOptions {
            inline: Some(false),
            ..Default::default()
        })));
        let (css, map) = run("a { color: black }", &opts);
        assert_eq!(css, "a { color: black }\n/*# sourceMappingURL=a.css.map */");

        let raw = RawSourceMap::from_json(&map.unwrap()).unwrap();
        assert_eq!(raw.file.as_deref(), Some("a.css"));
        assert_eq!(raw.sources, vec!["../src/a.css".to_string()]);
        assert_eq!(
            raw.sources_content,
            Some(vec![Some("a { color: black }".to_string())])
        );
        assert_eq!(raw.mappings, "AAAA,IAAI,aAAa");
    }

    #[test]
    fn test_annotation_path_moves_map_dir() {
        let opts = opts(Some(MapSetting::Options(MapOptions {
            annotation: Some(Annotation::Path("maps/a.css.map".into())),
            sources_content: Some(false),
            ..Default::default()
        })));
        let (css, map) = run("a {}", &opts);
        assert_eq!(css, "a {}\n/*# sourceMappingURL=maps/a.css.map */");
        let raw = RawSourceMap::from_json(&map.unwrap()).unwrap();
        assert_eq!(raw.file.as_deref(), Some("../a.css"));
        assert_eq!(raw.sources, vec!["../../src/a.css".to_string()]);
        assert_eq!(raw.sources_content, None);
    }

    #[test]
    fn test_chains_inline_previous_map() {
        let prev = r#"{"version":3,"file":"a.css","sources":["a.sass"],"sourcesContent":["a\n  color: black"],"names":[],"mappings":"AAAA,IACE"}"#;
        let css = format!(
            "a {{ color: black }}\n/*# sourceMappingURL={} */",
            encode_inline_map(prev)
        );
        let opts = opts(Some(MapSetting::Options(MapOptions {
            inline: Some(false),
            ..Default::default()
        })));
        let (css, map) = run(&css, &opts);
        assert_eq!(css, "a { color: black }\n/*# sourceMappingURL=a.css.map */");

        let raw = RawSourceMap::from_json(&map.unwrap()).unwrap();
        assert_eq!(raw.sources, vec!["../src/a.sass".to_string()]);
        assert_eq!(
            raw.sources_content,
            Some(vec![Some("a\n  color: black".to_string())])
        );
    }

    #[test]
    fn test_prev_false_disables_chaining() {
        let prev = r#"{"version":3,"file":"a.css","sources":["a.sass"],"names":[],"mappings":"AAAA"}"#;
        let css = format!("a {{}}\n/*# sourceMappingURL={} */", encode_inline_map(prev));
        let opts = opts(Some(MapSetting::Options(MapOptions {
            inline: Some(false),
            prev: Some(PrevMap::Flag(false)),
            ..Default::default()
        })));
        let (_, map) = run(&css, &opts);
        let raw = RawSourceMap::from_json(&map.unwrap()).unwrap();
        assert_eq!(raw.sources, vec!["../src/a.css".to_string()]);
    }

    #[test]
    fn test_previous_map_alone_enables_mapping() {
        let prev = r#"{"version":3,"sources":["a.sass"],"names":[],"mappings":"AAAA"}"#;
        let css = format!("a {{}}\n/*# sourceMappingURL={} */", encode_inline_map(prev));
        let (css, map) = run(&css, &opts(None));
        assert!(map.is_none());
        assert!(css.contains("sourceMappingURL=data:application/json;base64,"));
    }
}
