//! Helpers for the `/`-separated paths stored inside source maps

use std::path::{Component, Path, PathBuf};

/// Whether `path` carries a URL scheme such as `http://` or `file://`
pub fn has_url_scheme(path: &str) -> bool {
    match path.find("://") {
        Some(idx) if idx > 0 => path[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Lexically normalize a `/`-separated path
///
/// Resolves `.` and `..` segments and collapses repeated separators. Leading
/// `..` segments of a relative path are kept; `..` above an absolute root is
/// dropped.
pub fn normalize_url(path: &str) -> String {
    if has_url_scheme(path) || path.is_empty() {
        return path.to_string();
    }

    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Resolve `.` and `..` components of a filesystem path
///
/// Purely lexical. Leading `..` of a relative path is kept; `..` above the
/// root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Join `path` onto `root`
///
/// Absolute paths and URLs are returned as-is. An empty root leaves the
/// path unchanged apart from normalization.
pub fn join_url(root: &str, path: &str) -> String {
    if path.is_empty() {
        return normalize_url(root);
    }
    if path.starts_with('/') || has_url_scheme(path) {
        return path.to_string();
    }
    if root.is_empty() || root == "." {
        return normalize_url(path);
    }
    normalize_url(&format!("{}/{}", root.trim_end_matches('/'), path))
}
