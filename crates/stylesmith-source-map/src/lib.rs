//! Source maps for Stylesmith
//!
//! This crate provides the pieces needed to carry source-map provenance
//! through a chain of stylesheet transformations:
//!
//! - [`annotation`]: finding and decoding `sourceMappingURL` comments
//! - [`SourceMapGenerator`]: building a v3 map and chaining it onto a previous
//!   stage's map with [`SourceMapGenerator::apply_source_map`]
//! - [`SourceMapConsumer`]: reading a v3 map and looking up original positions
//! - [`RawSourceMap`]: the serialized JSON shape
//!
//! # Example
//!
//! ```rust
//! use stylesmith_source_map::*;
//!
//! let mut generator = SourceMapGenerator::new(Some("out.css".into()));
//! generator.add_mapping(Mapping::new(1, 0).with_original("in.css", 1, 0));
//!
//! let raw = generator.to_raw();
//! assert_eq!(raw.sources, vec!["in.css".to_string()]);
//! assert_eq!(raw.mappings, "AAAA");
//! ```

pub mod annotation;
pub mod consumer;
pub mod error;
pub mod generator;
pub mod types;
pub mod utils;
pub mod vlq;

pub use annotation::{
    AnnotationMatch, SourceMapRefKind, decode_inline_map, encode_inline_map, find_annotation,
    is_data_url, source_map_ref_kind,
};
pub use consumer::{OriginalPosition, SourceMapConsumer};
pub use error::{Result, SourceMapError};
pub use generator::SourceMapGenerator;
pub use types::{Mapping, RawSourceMap};
pub use utils::{join_url, normalize_url};
