//! `sourceMappingURL` annotations
//!
//! Generated stylesheets point at their map with a trailing comment in one
//! of two forms:
//!
//! ```text
//! /*# sourceMappingURL=<value> */
//! //# sourceMappingURL=<value>
//! ```
//!
//! `<value>` is either a path (relative or absolute) or a `data:` URI that
//! embeds the whole map. Only the last annotation in a file counts.

use std::ops::Range;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SourceMapError};

static ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/\*\s*#\s*sourceMappingURL=([^\n]*?)\*/|//\s*#\s*sourceMappingURL=([^\s*]*)")
        .expect("annotation regex is valid")
});

static BASE64_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:application/json;(?:charset=utf-?8;)?base64,").expect("base64 regex is valid")
});

static ENCODING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:application/json;([^,]+),").expect("encoding regex is valid"));

const PLAIN_URI: &str = "data:application/json,";
const BASE64_URI: &str = "data:application/json;base64,";

/// A located annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMatch {
    /// The trimmed reference value
    pub url: String,
    /// Byte range of the whole comment
    pub comment: Range<usize>,
    /// Byte range of the trimmed reference value
    pub value: Range<usize>,
}

/// Whether a reference points at a file or embeds the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMapRefKind {
    File,
    Inline,
}

/// Find the last annotation in `text`
pub fn find_annotation(text: &str) -> Option<AnnotationMatch> {
    let captures = ANNOTATION_RE.captures_iter(text).last()?;
    let comment = captures.get(0)?.range();
    let raw = captures.get(1).or_else(|| captures.get(2))?;

    let raw_text = raw.as_str();
    let leading = raw_text.len() - raw_text.trim_start().len();
    let url = raw_text.trim().to_string();
    let start = raw.start() + leading;

    Some(AnnotationMatch {
        value: start..start + url.len(),
        url,
        comment,
    })
}

pub fn is_data_url(url: &str) -> bool {
    url.starts_with("data:")
}

/// Classify the last annotation in `text`, if any
pub fn source_map_ref_kind(text: &str) -> Option<SourceMapRefKind> {
    find_annotation(text).map(|m| {
        if is_data_url(&m.url) {
            SourceMapRefKind::Inline
        } else {
            SourceMapRefKind::File
        }
    })
}

/// Decode the map JSON embedded in a `data:` reference
///
/// Accepts `data:application/json,<percent-encoded>`,
/// `data:application/json;base64,<payload>` and
/// `data:application/json;charset=utf-8;base64,<payload>`.
pub fn decode_inline_map(url: &str) -> Result<String> {
    if let Some(encoded) = url.strip_prefix(PLAIN_URI) {
        return percent_encoding::percent_decode_str(encoded)
            .decode_utf8()
            .map(|text| text.into_owned())
            .map_err(|_| SourceMapError::InvalidUtf8);
    }

    if let Some(prefix) = BASE64_URI_RE.find(url) {
        let bytes = STANDARD.decode(url[prefix.end()..].trim())?;
        return String::from_utf8(bytes).map_err(|_| SourceMapError::InvalidUtf8);
    }

    let encoding = ENCODING_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| url.chars().take(40).collect());
    Err(SourceMapError::UnsupportedEncoding(encoding))
}

/// Encode map JSON as a base64 `data:` reference
pub fn encode_inline_map(map_json: &str) -> String {
    format!("{}{}", BASE64_URI, STANDARD.encode(map_json))
}
