//! Lexical path helpers
//!
//! Nothing here touches the filesystem: file table keys and pipeline roots
//! are compared purely by their components.

use std::path::{Path, PathBuf};

use stylesmith_source_map::utils::has_url_scheme;

pub use stylesmith_source_map::utils::normalize_path as normalize;

/// `path` relative to the directory `base`
///
/// Falls back to `path` itself when no relative form exists, such as an
/// absolute path against a relative base.
pub fn relative(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Re-express a relative source map entry written from `from_dir` as seen
/// from `to_dir`
///
/// Absolute paths, URLs and `<anonymous>`-style names are left alone.
pub fn rebase(source: &str, from_dir: &Path, to_dir: &Path) -> String {
    if source.starts_with('<') || has_url_scheme(source) || Path::new(source).is_absolute() {
        return source.to_string();
    }
    to_key(&relative(to_dir, &normalize(&from_dir.join(source))))
}

/// Whether `path` lies inside `root` (or is `root`)
pub fn is_within(root: &Path, path: &Path) -> bool {
    normalize(path).starts_with(normalize(root))
}

/// The directory part of a file table key, empty for top-level keys
pub fn key_dir(key: &str) -> &str {
    key.rfind('/').map(|idx| &key[..idx]).unwrap_or("")
}

/// A path as a `/`-separated file table key
pub fn to_key(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    if text.is_empty() { ".".to_string() } else { text }
}
