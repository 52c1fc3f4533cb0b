//! Stylesmith: stylesheet transformation for build pipelines
//!
//! A build pipeline hands [`StylesmithPlugin`] a [`FileTable`] of input files
//! plus the absolute source and destination roots. The plugin picks the
//! stylesheets matching its patterns, runs each through a transformer chain,
//! and writes the outputs back into the table, along with source maps that
//! chain onto any maps produced by earlier stages.
//!
//! # Example
//!
//! ```rust
//! use stylesmith_core::{BuildContext, FileRecord, FileTable, InputOptions, NoConfigLoader, StylesmithPlugin};
//! use stylesmith_css::{Node, transformer_fn};
//! use std::sync::Arc;
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
//! let plugin = StylesmithPlugin::new(InputOptions::new().pattern("**/*.sss").plugins(doubler))
//!     .with_config_loader(Arc::new(NoConfigLoader));
//!
//! let mut files: FileTable = [("a.sss", FileRecord::new("a { color: red }"))].into_iter().collect();
//! let build = BuildContext::new("/site/src", "/site/build");
//! pollster::block_on(plugin.run(&mut files, &build)).unwrap();
//!
//! assert_eq!(
//!     files.get("a.css").unwrap().text().as_deref(),
//!     Some("a { color: red; color: red }")
//! );
//! ```

pub mod config;
pub mod error;
pub mod files;
pub mod options;
pub mod output;
pub mod paths;
pub mod plugin;
pub mod plugins;
pub mod process;
pub mod source_map;

pub use config::{
    ConfigContext, ConfigLoader, ConfigResult, FileDescriptor, NoConfigLoader, RcConfigLoader, load_config,
};
pub use error::{ConfigError, OptionsOrigin, Result, StylesmithError};
pub use files::{
    BuildContext, DEFAULT_MODE, DependencyRecord, FieldValue, FileRecord, FileTable, matched_filenames,
    valid_files,
};
pub use options::{
    DEFAULT_PATTERN, InputOptions, Options, OptionsGenerator, OptionsInput, Renamer, RenamerInput,
    normalize_options,
};
pub use output::{dependency_record, write_output};
pub use plugin::StylesmithPlugin;
pub use plugins::{
    ModuleExport, ModuleLoadError, ModuleLoader, PluginFactory, PluginsInput, RegistryModuleLoader,
    load_plugins,
};
pub use process::{ProcessedCss, options_with_prev_map, process_css};
pub use source_map::{LocatedMap, find_source_map};
pub use stylesmith_css::{Annotation, MapOptions, MapSetting, PrevMap, ProcessOptions};
