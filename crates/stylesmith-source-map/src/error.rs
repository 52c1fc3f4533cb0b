//! Error types for source map operations

use thiserror::Error;

/// Errors raised while reading, decoding or chaining source maps
#[derive(Debug, Error)]
pub enum SourceMapError {
    /// The map text is not valid JSON, or not a v3 map
    #[error("Invalid source map: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Only version 3 maps are understood
    #[error("Unsupported source map version {0}")]
    UnsupportedVersion(u32),

    /// A `mappings` segment could not be decoded
    #[error("Invalid VLQ mapping data: {0}")]
    InvalidVlq(String),

    /// An inline `data:` annotation uses an encoding we cannot read
    #[error("Unsupported source map encoding {0}")]
    UnsupportedEncoding(String),

    /// The base64 payload of an inline map is malformed
    #[error("Invalid base64 in inline source map: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The decoded payload is not UTF-8
    #[error("Inline source map is not valid UTF-8")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, SourceMapError>;
