//! The shared file table and the pipeline roots
//!
//! A build pipeline hands every plugin one [`FileTable`]: an ordered map from
//! `/`-separated keys (relative to the source root) to [`FileRecord`]s.
//! Records carry optional contents, an octal mode string, and arbitrary
//! metadata fields that must survive any transformation.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::paths::normalize;

/// Mode given to records that did not carry one
pub const DEFAULT_MODE: &str = "0644";

/// Metadata attached under the dependencies key: each key a stylesheet read
/// maps to the record that key held before transformation
pub type DependencyRecord = IndexMap<String, Option<FileRecord>>;

/// A metadata field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Json(serde_json::Value),
    Dependencies(DependencyRecord),
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Json(value)
    }
}

/// One entry of the file table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileRecord {
    /// `None` marks a placeholder that transformers skip
    pub contents: Option<Vec<u8>>,
    pub mode: Option<String>,
    pub metadata: IndexMap<String, FieldValue>,
}

impl FileRecord {
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: Some(contents.into()),
            ..Self::default()
        }
    }

    /// A record without contents
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Contents decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.contents.as_deref().map(String::from_utf8_lossy)
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.metadata.get(key)
    }

    pub fn dependencies(&self, key: &str) -> Option<&DependencyRecord> {
        match self.metadata.get(key) {
            Some(FieldValue::Dependencies(deps)) => Some(deps),
            _ => None,
        }
    }

    /// A copy of this record's mode and metadata around new contents
    pub(crate) fn derive(&self, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: Some(contents.into()),
            mode: Some(self.mode.clone().unwrap_or_else(|| DEFAULT_MODE.to_string())),
            metadata: self.metadata.clone(),
        }
    }
}

/// Insertion-ordered map of file keys to records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileTable {
    files: IndexMap<String, FileRecord>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record; replacing keeps the key's position
    pub fn insert(&mut self, key: impl Into<String>, record: FileRecord) -> Option<FileRecord> {
        self.files.insert(key.into(), record)
    }

    pub fn get(&self, key: &str) -> Option<&FileRecord> {
        self.files.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut FileRecord> {
        self.files.get_mut(key)
    }

    /// Remove a record, keeping the order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<FileRecord> {
        self.files.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FileRecord)> for FileTable {
    fn from_iter<T: IntoIterator<Item = (K, FileRecord)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The absolute source and destination roots of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    source: PathBuf,
    destination: PathBuf,
}

impl BuildContext {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: normalize(&source.into()),
            destination: normalize(&destination.into()),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Absolute path of `key` under the source root
    pub fn source_path(&self, key: &str) -> PathBuf {
        normalize(&self.source.join(key))
    }

    /// Absolute path of `key` under the destination root
    pub fn destination_path(&self, key: &str) -> PathBuf {
        normalize(&self.destination.join(key))
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Keys selected by an ordered list of glob patterns
///
/// Positive patterns add matching keys, `!`-prefixed patterns remove the
/// keys they match from what was added so far. The result keeps table order.
pub fn matched_filenames(files: &FileTable, patterns: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut selected: HashSet<&str> = HashSet::new();

    for raw in patterns {
        let (negated, glob) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw.as_str()),
        };
        let pattern = Pattern::new(glob).map_err(|e| ConfigError::InvalidPattern {
            pattern: raw.clone(),
            message: e.msg.to_string(),
        })?;

        if negated {
            selected.retain(|key| !pattern.matches_with(key, MATCH_OPTIONS));
        } else {
            selected.extend(files.keys().filter(|key| pattern.matches_with(key, MATCH_OPTIONS)));
        }
    }

    Ok(files
        .keys()
        .filter(|key| selected.contains(key))
        .map(str::to_string)
        .collect())
}

/// The named records that have contents, paired with their keys
pub fn valid_files(files: &FileTable, names: &[String]) -> Vec<(String, FileRecord)> {
    names
        .iter()
        .filter_map(|name| {
            files
                .get(name)
                .filter(|record| record.contents.is_some())
                .map(|record| (name.clone(), record.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(keys: &[&str]) -> FileTable {
        keys.iter().map(|k| (*k, FileRecord::new(*k))).collect()
    }

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_negations_remove_partials() {
        let files = table(&["main.css", "_sub.css", "dir/_child.css", "dir/x.css", "a.js", ".hidden.css"]);
        let matched = matched_filenames(&files, &patterns(&["**/*.css", "!**/_*", "!**/_*/**"])).unwrap();
        assert_eq!(matched, vec!["main.css", "dir/x.css"]);
    }

    #[test]
    fn test_partial_directories_are_excluded() {
        let files = table(&["_dir/x.css", "ok/y.css"]);
        let matched = matched_filenames(&files, &patterns(&["**/*.css", "!**/_*/**"])).unwrap();
        assert_eq!(matched, vec!["ok/y.css"]);
    }

    #[test]
    fn test_output_follows_table_order() {
        let files = table(&["b.sss", "a.css", "c.sss"]);
        let matched = matched_filenames(&files, &patterns(&["*.css", "*.sss"])).unwrap();
        assert_eq!(matched, vec!["b.sss", "a.css", "c.sss"]);
    }

    #[test]
    fn test_empty_or_negative_only_patterns() {
        let files = table(&["a.css"]);
        assert!(matched_filenames(&files, &[]).unwrap().is_empty());
        assert!(matched_filenames(&files, &patterns(&["!*.js"])).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let files = table(&["a.css"]);
        let err = matched_filenames(&files, &patterns(&["a[.css"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref pattern, .. } if pattern == "a[.css"));
    }

    #[test]
    fn test_valid_files_skips_placeholders() {
        let mut files = table(&["a.css"]);
        files.insert("b.css", FileRecord::placeholder());
        let valid = valid_files(&files, &patterns(&["a.css", "b.css", "missing.css"]));
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].0, "a.css");
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut files = table(&["a", "b", "c"]);
        files.remove("b");
        files.insert("d", FileRecord::placeholder());
        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_derive_keeps_metadata_and_defaults_mode() {
        let original = FileRecord::new("a{}").with_field("title", serde_json::json!("x"));
        let derived = original.derive("b{}");
        assert_eq!(derived.mode.as_deref(), Some(DEFAULT_MODE));
        assert_eq!(derived.field("title"), Some(&FieldValue::Json(serde_json::json!("x"))));

        let derived = original.with_mode("0600").derive("c{}");
        assert_eq!(derived.mode.as_deref(), Some("0600"));
    }

    #[test]
    fn test_build_context_paths() {
        let build = BuildContext::new("/site/./src", "/site/build");
        assert_eq!(build.source(), Path::new("/site/src"));
        assert_eq!(build.source_path("dir/a.css"), PathBuf::from("/site/src/dir/a.css"));
        assert_eq!(build.destination_path("../x.map"), PathBuf::from("/site/x.map"));
    }
}
