//! Stylesheet processing host for Stylesmith
//!
//! This crate parses stylesheets into a whitespace-preserving tree, runs a
//! chain of [`Transformer`]s over it, and writes the tree back out together
//! with a source map that chains onto the map of the previous stage.
//!
//! It does not ship any transformers of its own.
//!
//! # Example
//!
//! ```rust
//! use stylesmith_css::{Node, Processor, ProcessOptions, transformer_fn};
//!
//! let doubler = transformer_fn("doubler", |root, _ctx| {
//!     root.each_container_mut(|nodes| {
//!         *nodes = std::mem::take(nodes)
//!             .into_iter()
//!             .flat_map(|node| match node {
//!                 Node::Decl(decl) => vec![Node::Decl(decl.clone()), Node::Decl(decl)],
//!                 other => vec![other],
//!             })
//!             .collect();
//!     });
//!     Ok(())
//! });
//! let processor = Processor::new(vec![doubler.into()]);
//! let result =
//!     pollster::block_on(processor.process("a { color: black }", &ProcessOptions::default()))
//!         .unwrap();
//! assert_eq!(result.css, "a { color: black; color: black }");
//! ```

pub mod error;
pub mod map;
pub mod node;
pub mod options;
pub mod parser;
pub mod plugin;
pub mod processor;
pub mod result;
pub mod stringifier;

pub use error::{CssSyntaxError, PluginError, Result};
pub use map::{MapGenerator, PreviousMap};
pub use node::{
    AtRule, Comment, Declaration, Input, Node, Position, Rule, Source, Stylesheet,
};
pub use options::{Annotation, MapOptions, MapSetting, PrevMap, ProcessOptions};
pub use parser::parse;
pub use plugin::{AcceptedPlugin, FnTransformer, Transformer, transformer_fn};
pub use processor::Processor;
pub use result::{Message, ProcessResult, TransformContext, Warning};
pub use stringifier::{stringify, stringify_with};
