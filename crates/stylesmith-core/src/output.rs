//! Writing processed output back into the file table
//!
//! The processor generates a map relative to the annotation it was told to
//! write, which may point anywhere on disk. Before anything is stored, the
//! map is given a key inside one of the pipeline roots and the annotation,
//! the map's `file`, and its `sources` are rewritten to agree with that key.

use std::path::{Path, PathBuf};

use stylesmith_css::Message;
use stylesmith_source_map::{RawSourceMap, find_annotation, is_data_url};

use crate::error::Result;
use crate::files::{BuildContext, DependencyRecord, FieldValue, FileRecord, FileTable};
use crate::paths::{is_within, key_dir, normalize, rebase, relative, to_key};
use crate::process::ProcessedCss;

/// Records for every file a stylesheet read, keyed as in the file table
///
/// The stylesheet itself comes first, then each reported dependency in
/// report order. Values are the records as they were before any output was
/// written; keys missing from the table map to `None`.
pub fn dependency_record(
    snapshot: &FileTable,
    build: &BuildContext,
    filename: &str,
    original: &FileRecord,
    messages: &[Message],
) -> DependencyRecord {
    let mut deps = DependencyRecord::new();
    deps.insert(filename.to_string(), Some(original.clone()));

    for message in messages {
        let Message::Dependency { file, .. } = message else {
            continue;
        };
        let key = dependency_key(build, file);
        if !deps.contains_key(&key) {
            let record = snapshot.get(&key).cloned();
            deps.insert(key, record);
        }
    }
    deps
}

fn dependency_key(build: &BuildContext, file: &Path) -> String {
    if !file.is_absolute() {
        return to_key(&normalize(file));
    }
    let file = normalize(file);
    match first_containing([build.source(), build.destination()], &file) {
        Some(root) => to_key(&relative(root, &file)),
        None => to_key(&relative(build.source(), &file)),
    }
}

/// The first of `roots` that contains `path`
fn first_containing<'a>(roots: [&'a Path; 2], path: &Path) -> Option<&'a Path> {
    roots.into_iter().find(|root| is_within(root, path))
}

/// The key and rewritten JSON of an externally generated map
struct PlacedMap {
    key: String,
    json: String,
}

/// Store processed output under `new_filename`
///
/// The input key is removed when it differs from `new_filename`. Output
/// records keep the input's mode (default `0644`) and metadata; `deps`,
/// when given, is attached to every record written under its key.
pub fn write_output(
    files: &mut FileTable,
    build: &BuildContext,
    filename: &str,
    new_filename: &str,
    processed: &ProcessedCss,
    original: &FileRecord,
    deps: Option<(&str, &DependencyRecord)>,
) -> Result<()> {
    let mut css = processed.css.clone();
    let placed = match &processed.map {
        Some(map) => Some(place_map(&mut css, map, build, new_filename)?),
        None => None,
    };

    if filename != new_filename {
        files.remove(filename);
    }

    let with_deps = |mut record: FileRecord| {
        if let Some((key, deps)) = deps {
            record
                .metadata
                .insert(key.to_string(), FieldValue::Dependencies(deps.clone()));
        }
        record
    };

    files.insert(new_filename, with_deps(original.derive(css)));
    if let Some(placed) = placed {
        tracing::debug!(file = new_filename, map = %placed.key, "Writing source map");
        files.insert(placed.key, with_deps(original.derive(placed.json)));
    }
    Ok(())
}

fn place_map(css: &mut String, map: &str, build: &BuildContext, new_filename: &str) -> Result<PlacedMap> {
    let css_path = build.destination_path(new_filename);
    let css_dir = css_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let fallback_key = format!("{}.map", new_filename);

    let annotation = find_annotation(css).filter(|a| !is_data_url(&a.url));

    let (key, generated_dir) = match &annotation {
        None => (fallback_key, css_dir),
        Some(annotation) => {
            let url = Path::new(&annotation.url);
            let resolved = if url.is_absolute() {
                normalize(url)
            } else {
                normalize(&css_dir.join(url))
            };
            let generated_dir = resolved.parent().map(Path::to_path_buf).unwrap_or_default();
            // A map annotated with the stylesheet's own path would overwrite it
            let resolved = if resolved == css_path {
                let mut with_ext = resolved.into_os_string();
                with_ext.push(".map");
                PathBuf::from(with_ext)
            } else {
                resolved
            };
            let key = first_containing([build.destination(), build.source()], &resolved)
                .map(|root| to_key(&relative(root, &resolved)))
                .unwrap_or(fallback_key);
            (key, generated_dir)
        }
    };

    if let Some(annotation) = &annotation {
        let pointer = to_key(&relative(Path::new(key_dir(new_filename)), Path::new(&key)));
        css.replace_range(annotation.value.clone(), &pointer);
    }

    let mut raw = RawSourceMap::from_json(map)?;
    raw.file = Some(to_key(&relative(Path::new(key_dir(&key)), Path::new(new_filename))));

    // Also folds detours such as `../src/../build/a.scss` left by chaining
    let map_dir = build.destination_path(key_dir(&key));
    for source in raw.sources.iter_mut() {
        *source = rebase(source, &generated_dir, &map_dir);
    }

    Ok(PlacedMap {
        key,
        json: raw.to_json(),
    })
}
