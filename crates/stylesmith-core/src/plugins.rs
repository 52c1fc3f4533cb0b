//! Resolving plugin declarations into transformers
//!
//! Plugins can be given as ready transformer units, as module names that a
//! [`ModuleLoader`] imports, as (nested) lists of either, or as a record of
//! module name to options. A module export may be a factory, a plugin, or an
//! object with a `postcss` or `default` member wrapping one.
//!
//! Every failure names the offending entry with a JavaScript-style property
//! path such as `plugins[0]['./x']`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use stylesmith_css::{AcceptedPlugin, Processor, Transformer};
use thiserror::Error;

use crate::error::{Result, StylesmithError};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier regex is valid"));

/// A plugin declaration
#[derive(Clone)]
pub enum PluginsInput {
    Unit(AcceptedPlugin),
    /// A module name resolved through the module loader
    Name(String),
    List(Vec<PluginsInput>),
    /// Module name to options; `false` skips the entry
    Record(IndexMap<String, Value>),
}

impl PluginsInput {
    /// Read a declaration from a config file value
    ///
    /// Strings name modules, arrays list declarations, objects are records.
    pub fn from_json(value: &Value) -> Result<Self> {
        let mut path = Vec::new();
        Self::from_json_at(value, &mut path)
    }

    fn from_json_at(value: &Value, path: &mut Vec<PathSegment>) -> Result<Self> {
        match value {
            Value::String(name) => Ok(PluginsInput::Name(name.clone())),
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    list.push(Self::from_json_at(item, path)?);
                    path.pop();
                }
                Ok(PluginsInput::List(list))
            }
            Value::Object(map) => Ok(PluginsInput::Record(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            _ => Err(StylesmithError::InvalidPlugin {
                path: format_path(path),
            }),
        }
    }
}

impl From<AcceptedPlugin> for PluginsInput {
    fn from(plugin: AcceptedPlugin) -> Self {
        PluginsInput::Unit(plugin)
    }
}

impl From<Arc<dyn Transformer>> for PluginsInput {
    fn from(transformer: Arc<dyn Transformer>) -> Self {
        PluginsInput::Unit(transformer.into())
    }
}

impl From<Processor> for PluginsInput {
    fn from(processor: Processor) -> Self {
        PluginsInput::Unit(processor.into())
    }
}

impl From<&str> for PluginsInput {
    fn from(name: &str) -> Self {
        PluginsInput::Name(name.to_string())
    }
}

impl From<Vec<PluginsInput>> for PluginsInput {
    fn from(list: Vec<PluginsInput>) -> Self {
        PluginsInput::List(list)
    }
}

impl From<IndexMap<String, Value>> for PluginsInput {
    fn from(record: IndexMap<String, Value>) -> Self {
        PluginsInput::Record(record)
    }
}

impl fmt::Debug for PluginsInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginsInput::Unit(plugin) => fmt::Debug::fmt(plugin, f),
            PluginsInput::Name(name) => f.debug_tuple("Name").field(name).finish(),
            PluginsInput::List(list) => f.debug_list().entries(list).finish(),
            PluginsInput::Record(record) => f.debug_map().entries(record).finish(),
        }
    }
}

/// Something a module can export that builds a plugin from options
pub trait PluginFactory: Send + Sync {
    fn create(&self, options: Option<&Value>) -> ModuleExport;
}

impl<F> PluginFactory for F
where
    F: Fn(Option<&Value>) -> ModuleExport + Send + Sync,
{
    fn create(&self, options: Option<&Value>) -> ModuleExport {
        self(options)
    }
}

/// The value a module exports
#[derive(Clone)]
pub enum ModuleExport {
    Factory(Arc<dyn PluginFactory>),
    Plugin(AcceptedPlugin),
    /// An object whose `postcss` or `default` member holds the real export
    Object {
        postcss: Option<Box<ModuleExport>>,
        default: Option<Box<ModuleExport>>,
    },
    /// Anything else
    Value(Value),
}

impl ModuleExport {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> ModuleExport + Send + Sync + 'static,
    {
        ModuleExport::Factory(Arc::new(f))
    }

    pub fn plugin(plugin: impl Into<AcceptedPlugin>) -> Self {
        ModuleExport::Plugin(plugin.into())
    }

    /// An object exporting `inner` as its `default` member
    pub fn with_default(inner: ModuleExport) -> Self {
        ModuleExport::Object {
            postcss: None,
            default: Some(Box::new(inner)),
        }
    }

    /// An object exporting `inner` as its `postcss` member
    pub fn with_postcss(inner: ModuleExport) -> Self {
        ModuleExport::Object {
            postcss: Some(Box::new(inner)),
            default: None,
        }
    }

    fn unwrap_members(self) -> Self {
        let export = match self {
            ModuleExport::Object {
                postcss: Some(inner), ..
            } => *inner,
            other => other,
        };
        match export {
            ModuleExport::Object {
                default: Some(inner), ..
            } => *inner,
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModuleLoadError {
    #[error("Cannot find module '{0}'")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

/// Imports modules by name
pub trait ModuleLoader: Send + Sync {
    fn load(&self, name: &str) -> std::result::Result<ModuleExport, ModuleLoadError>;
}

/// A module loader backed by an in-memory table of named exports
#[derive(Clone, Default)]
pub struct RegistryModuleLoader {
    modules: IndexMap<String, ModuleExport>,
}

impl RegistryModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, export: ModuleExport) -> &mut Self {
        self.modules.insert(name.into(), export);
        self
    }

    pub fn with(mut self, name: impl Into<String>, export: ModuleExport) -> Self {
        self.register(name, export);
        self
    }
}

impl ModuleLoader for RegistryModuleLoader {
    fn load(&self, name: &str) -> std::result::Result<ModuleExport, ModuleLoadError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleLoadError::NotFound(name.to_string()))
    }
}

#[derive(Debug, Clone)]
enum PathSegment {
    Index(usize),
    Key(String),
}

fn format_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|segment| match segment {
            PathSegment::Index(index) => format!("[{}]", index),
            PathSegment::Key(key) if IDENTIFIER_RE.is_match(key) => format!(".{}", key),
            PathSegment::Key(key) => {
                format!("['{}']", key.replace('\\', "\\\\").replace('\'', "\\'"))
            }
        })
        .collect()
}

/// Resolve a declaration into an ordered list of plugins
pub fn load_plugins(input: &PluginsInput, loader: &dyn ModuleLoader) -> Result<Vec<AcceptedPlugin>> {
    let mut plugins = Vec::new();
    let mut path = Vec::new();
    collect(input, loader, &mut path, &mut plugins)?;
    Ok(plugins)
}

fn collect(
    input: &PluginsInput,
    loader: &dyn ModuleLoader,
    path: &mut Vec<PathSegment>,
    out: &mut Vec<AcceptedPlugin>,
) -> Result<()> {
    match input {
        PluginsInput::Unit(plugin) => out.push(plugin.clone()),
        PluginsInput::Name(name) => out.push(load_plugin(name, None, loader, path)?),
        PluginsInput::List(list) => {
            for (index, item) in list.iter().enumerate() {
                path.push(PathSegment::Index(index));
                collect(item, loader, path, out)?;
                path.pop();
            }
        }
        PluginsInput::Record(record) => {
            for (name, options) in record {
                if *options == Value::Bool(false) {
                    continue;
                }
                path.push(PathSegment::Key(name.clone()));
                out.push(load_plugin(name, Some(options), loader, path)?);
                path.pop();
            }
        }
    }
    Ok(())
}

fn load_plugin(
    name: &str,
    options: Option<&Value>,
    loader: &dyn ModuleLoader,
    path: &[PathSegment],
) -> Result<AcceptedPlugin> {
    tracing::debug!(plugin = name, "Loading plugin module");
    let export = loader.load(name).map_err(|e| StylesmithError::PluginLoad {
        message: e.to_string(),
    })?;

    let with_options = options.filter(|value| matches!(value, Value::Object(map) if !map.is_empty()));
    let export = match (with_options, export) {
        (Some(options), ModuleExport::Factory(factory)) => factory.create(Some(options)),
        (Some(_), _) => {
            return Err(StylesmithError::PluginType {
                name: name.to_string(),
            });
        }
        (None, export) => export,
    };

    // A bare creator is invoked without options
    let export = match export.unwrap_members() {
        ModuleExport::Factory(factory) => factory.create(None),
        other => other,
    };

    match export {
        ModuleExport::Plugin(plugin) => Ok(plugin),
        _ => Err(StylesmithError::InvalidPlugin {
            path: format_path(path),
        }),
    }
}
