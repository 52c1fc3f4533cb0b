//! Finding an input's previous source map in the file table
//!
//! An input produced by an earlier stage may end with a `sourceMappingURL`
//! annotation naming a map file. That file is looked up in the table, never
//! read from disk. The reference is tried as a key, then as a path under the
//! source root, then under the destination root; the first table entry that
//! matches wins.
//!
//! Maps in the table are written relative to where they will be stored, so
//! their `sources` are rebased onto the input's directory before the
//! processor sees them.

use std::path::{Path, PathBuf};

use stylesmith_source_map::utils::has_url_scheme;
use stylesmith_source_map::{RawSourceMap, find_annotation, is_data_url};
use tracing::debug;

use crate::files::{BuildContext, FileRecord, FileTable};
use crate::paths::{key_dir, normalize, rebase, to_key};

/// A previous map found in the file table
#[derive(Debug, Clone)]
pub struct LocatedMap {
    pub key: String,
    pub record: FileRecord,
    /// Directory the map's relative `sources` start from
    pub dir: PathBuf,
}

impl LocatedMap {
    /// The map text with relative sources re-expressed from `to_dir`
    ///
    /// A relative `sourceRoot` is rebased in place of the sources. Text that
    /// is not a valid map is passed through for the processor to reject.
    pub fn rebased_text(&self, to_dir: &Path) -> Option<String> {
        let text = self.record.text()?;
        if self.dir == to_dir {
            return Some(text.into_owned());
        }
        let Ok(mut raw) = RawSourceMap::from_json(&text) else {
            return Some(text.into_owned());
        };

        match raw.source_root.as_deref() {
            Some(root) if !root.is_empty() => {
                if !has_url_scheme(root) && !root.starts_with('/') {
                    raw.source_root = Some(rebase(root, &self.dir, to_dir));
                }
            }
            _ => {
                for source in raw.sources.iter_mut() {
                    *source = rebase(source, &self.dir, to_dir);
                }
            }
        }
        debug!(map = %self.key, from = %self.dir.display(), to = %to_dir.display(), "Rebased previous source map");
        Some(raw.to_json())
    }
}

/// The map record referenced by `contents`
///
/// Returns `None` for inputs without an annotation and for inline (`data:`)
/// maps, which the processor reads from the stylesheet itself. A map matched
/// by key or under the destination root was placed there by an earlier
/// stage, so its sources are relative to the destination tree.
pub fn find_source_map(
    files: &FileTable,
    filename: &str,
    contents: &str,
    build: &BuildContext,
) -> Option<LocatedMap> {
    let annotation = find_annotation(contents)?;
    if is_data_url(&annotation.url) {
        return None;
    }

    let url = Path::new(&annotation.url);
    let (target, exact_key) = if url.is_absolute() {
        (normalize(url), annotation.url.clone())
    } else {
        let source_dir = build
            .source_path(filename)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let relative_dir = Path::new(filename).parent().map(Path::to_path_buf).unwrap_or_default();
        (normalize(&source_dir.join(url)), to_key(&normalize(&relative_dir.join(url))))
    };

    let matchers: [(&dyn Fn(&str) -> bool, &Path); 3] = [
        (&|key: &str| key == exact_key, build.destination()),
        (&|key: &str| joined(build.source(), key) == target, build.source()),
        (&|key: &str| joined(build.destination(), key) == target, build.destination()),
    ];

    matchers.iter().find_map(|(matches, root)| {
        files.iter().find(|(key, _)| matches(key)).map(|(key, record)| LocatedMap {
            key: key.to_string(),
            record: record.clone(),
            dir: joined(root, key_dir(key)),
        })
    })
}

fn joined(root: &Path, key: &str) -> PathBuf {
    normalize(&root.join(key))
}
