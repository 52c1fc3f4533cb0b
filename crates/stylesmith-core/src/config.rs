//! Per-file configuration discovery
//!
//! Before a file is processed, a [`ConfigLoader`] may find a configuration
//! that replaces the plugin list and process options for that file. Loaders
//! must never set `from` or `to`; those always come from the file's position.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use stylesmith_css::{AcceptedPlugin, ProcessOptions};

use crate::error::{ConfigError, OptionsOrigin, Result};
use crate::files::BuildContext;
use crate::options::validate_reserved;
use crate::plugins::{ModuleLoader, PluginsInput, load_plugins};

/// The file a configuration is looked up for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub dirname: PathBuf,
    pub basename: String,
    /// Extension including the leading dot, empty if there is none
    pub extname: String,
}

impl FileDescriptor {
    pub fn new(path: &Path) -> Self {
        Self {
            dirname: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            basename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extname: path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default(),
        }
    }
}

/// What a loader sees when searching
#[derive(Debug, Clone)]
pub struct ConfigContext {
    /// Current options, with `from` and `to` set for this file
    pub options: ProcessOptions,
    pub file: FileDescriptor,
    /// Plugins resolved from the plugin's own options
    pub plugins_list: Vec<AcceptedPlugin>,
    pub build: BuildContext,
}

/// A configuration found by a loader
#[derive(Debug, Clone)]
pub struct ConfigResult {
    /// Where the configuration came from
    pub file: PathBuf,
    pub options: ProcessOptions,
    pub plugins: Vec<AcceptedPlugin>,
}

/// Finds configuration for one file
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// `Ok(None)` when there is no configuration for this file
    async fn find(&self, ctx: &ConfigContext) -> Result<Option<ConfigResult>>;
}

/// Never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConfigLoader;

#[async_trait]
impl ConfigLoader for NoConfigLoader {
    async fn find(&self, _ctx: &ConfigContext) -> Result<Option<ConfigResult>> {
        Ok(None)
    }
}

/// Look up the configuration for the file at `source_path`
///
/// A found configuration may not set `from` or `to`; the values in
/// `options` are written back on top of whatever it returns.
pub async fn load_config(
    plugins: &[AcceptedPlugin],
    options: &ProcessOptions,
    source_path: &Path,
    build: &BuildContext,
    loader: &dyn ConfigLoader,
) -> Result<Option<ConfigResult>> {
    let ctx = ConfigContext {
        options: options.clone(),
        file: FileDescriptor::new(source_path),
        plugins_list: plugins.to_vec(),
        build: build.clone(),
    };

    let Some(mut config) = loader.find(&ctx).await? else {
        return Ok(None);
    };

    validate_reserved(&config.options, OptionsOrigin::ConfigFile(config.file.clone()))?;
    config.options.from = options.from.clone();
    config.options.to = options.to.clone();
    Ok(Some(config))
}

/// The part of `package.json` that may hold a configuration
#[derive(Debug, Deserialize)]
struct PackageManifest {
    postcss: Option<Value>,
}

/// Files searched in each directory, after `package.json`
const RC_FILES: [&str; 4] = [".postcssrc", ".postcssrc.json", ".postcssrc.yaml", ".postcssrc.yml"];

/// Searches from the file's directory upward for a configuration file
///
/// In each directory, a `postcss` field in `package.json` wins over the rc
/// files, which are tried in order. `.postcssrc` may hold JSON or YAML.
/// The `plugins` field is resolved through the module loader; everything
/// else becomes the process options.
///
/// The lookup reads the filesystem synchronously inside [`ConfigLoader::find`],
/// so it blocks whichever executor polls it. It needs no async runtime. On a
/// multi-threaded runtime with many stylesheets, wrap the plugin run in
/// `spawn_blocking` or supply a [`ConfigLoader`] that reads asynchronously.
pub struct RcConfigLoader {
    module_loader: Arc<dyn ModuleLoader>,
    stop_dir: Option<PathBuf>,
}

impl RcConfigLoader {
    pub fn new(module_loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            module_loader,
            stop_dir: None,
        }
    }

    /// Do not search above `dir`
    pub fn stop_at(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stop_dir = Some(dir.into());
        self
    }

    /// Blocking walk from `start` toward the filesystem root
    fn search(&self, start: &Path) -> Result<Option<(PathBuf, Value)>> {
        for dir in start.ancestors() {
            let package = dir.join("package.json");
            if package.is_file() {
                let manifest: PackageManifest = serde_json::from_str(&fs::read_to_string(&package)?)
                    .map_err(|e| invalid_config(&package, e))?;
                if let Some(config) = manifest.postcss {
                    return Ok(Some((package, config)));
                }
            }

            for name in RC_FILES {
                let path = dir.join(name);
                if path.is_file() {
                    let text = fs::read_to_string(&path)?;
                    let value: Value = if name.ends_with(".json") {
                        serde_json::from_str(&text).map_err(|e| invalid_config(&path, e))?
                    } else {
                        serde_yaml::from_str(&text).map_err(|e| invalid_config(&path, e))?
                    };
                    return Ok(Some((path, value)));
                }
            }

            if self.stop_dir.as_deref() == Some(dir) {
                break;
            }
        }
        Ok(None)
    }

    fn read_config(&self, file: PathBuf, value: Value) -> Result<ConfigResult> {
        let Value::Object(mut fields) = value else {
            return Err(invalid_config(&file, "configuration must be an object").into());
        };

        let plugins = match fields.remove("plugins") {
            None | Some(Value::Null) => Vec::new(),
            Some(declared) => load_plugins(&PluginsInput::from_json(&declared)?, self.module_loader.as_ref())?,
        };
        let options: ProcessOptions =
            serde_json::from_value(Value::Object(fields)).map_err(|e| invalid_config(&file, e))?;

        Ok(ConfigResult {
            file,
            options,
            plugins,
        })
    }
}

#[async_trait]
impl ConfigLoader for RcConfigLoader {
    async fn find(&self, ctx: &ConfigContext) -> Result<Option<ConfigResult>> {
        let Some((file, value)) = self.search(&ctx.file.dirname)? else {
            return Ok(None);
        };
        tracing::debug!(config = %file.display(), "Found configuration file");
        self.read_config(file, value).map(Some)
    }
}

fn invalid_config(file: &Path, message: impl ToString) -> ConfigError {
    ConfigError::InvalidConfigFile {
        file: file.to_path_buf(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use stylesmith_css::{MapSetting, Node, transformer_fn};

    use super::*;
    use crate::error::StylesmithError;
    use crate::plugins::{ModuleExport, RegistryModuleLoader};

    fn module_loader() -> Arc<dyn ModuleLoader> {
        Arc::new(RegistryModuleLoader::new().with(
            "doubler",
            ModuleExport::plugin(transformer_fn("doubler", |root, _| {
                root.each_container_mut(|nodes| {
                    *nodes = std::mem::take(nodes)
                        .into_iter()
                        .flat_map(|node| match node {
                            Node::Decl(decl) => vec![Node::Decl(decl.clone()), Node::Decl(decl)],
                            other => vec![other],
                        })
                        .collect();
                });
                Ok(())
            })),
        ))
    }

    fn find(loader: &RcConfigLoader, file: &Path) -> Result<Option<ConfigResult>> {
        let build = BuildContext::new("/site/src", "/site/build");
        let options = ProcessOptions::default().with_positions(file.to_path_buf(), "/site/build/a.css".into());
        pollster::block_on(load_config(&[], &options, file, &build, loader))
    }

    #[test]
    fn test_rc_lookup_needs_no_runtime() {
        use futures::FutureExt;

        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(".postcssrc.json"), r#"{"map":true}"#).unwrap();
        let loader = RcConfigLoader::new(module_loader()).stop_at(root.path());
        let file = root.path().join("a.css");
        let build = BuildContext::new("/site/src", "/site/build");
        let options = ProcessOptions::default().with_positions(file.clone(), "/site/build/a.css".into());

        // Reads happen inline, so the first poll already has the answer
        let found = load_config(&[], &options, &file, &build, &loader).now_or_never();
        let config = found.unwrap().unwrap().unwrap();
        assert_eq!(config.file, root.path().join(".postcssrc.json"));
    }

    #[test]
    fn test_file_descriptor() {
        let file = FileDescriptor::new(Path::new("/site/src/dir/a.sss"));
        assert_eq!(file.dirname, PathBuf::from("/site/src/dir"));
        assert_eq!(file.basename, "a.sss");
        assert_eq!(file.extname, ".sss");
    }

    #[test]
    fn test_rc_file_in_parent_directory() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("styles/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join(".postcssrc.yml"), "map: true\nplugins:\n  - doubler\n").unwrap();

        let loader = RcConfigLoader::new(module_loader()).stop_at(root.path());
        let config = find(&loader, &nested.join("a.css")).unwrap().unwrap();
        assert_eq!(config.file, root.path().join(".postcssrc.yml"));
        assert_eq!(config.plugins.len(), 1);
        assert!(matches!(config.options.map, Some(MapSetting::Bool(true))));
        assert_eq!(config.options.from.as_deref(), Some(nested.join("a.css").as_path()));
    }

    #[test]
    fn test_package_json_field_wins() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("package.json"), r#"{"name":"x","postcss":{"plugins":{"doubler":{}}}}"#).unwrap();
        fs::write(root.path().join(".postcssrc"), "{}").unwrap();

        let loader = RcConfigLoader::new(module_loader()).stop_at(root.path());
        let config = find(&loader, &root.path().join("a.css")).unwrap().unwrap();
        assert_eq!(config.file, root.path().join("package.json"));
        assert_eq!(config.plugins.len(), 1);
    }

    #[test]
    fn test_package_json_without_field_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("package.json"), r#"{"name":"x"}"#).unwrap();
        fs::write(root.path().join(".postcssrc"), r#"{"map":{"inline":false}}"#).unwrap();

        let loader = RcConfigLoader::new(module_loader()).stop_at(root.path());
        let config = find(&loader, &root.path().join("a.css")).unwrap().unwrap();
        assert_eq!(config.file, root.path().join(".postcssrc"));
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_nothing_found() {
        let root = tempfile::tempdir().unwrap();
        let loader = RcConfigLoader::new(module_loader()).stop_at(root.path());
        assert!(find(&loader, &root.path().join("a.css")).unwrap().is_none());
    }

    #[test]
    fn test_reserved_fields_in_config_file() {
        let root = tempfile::tempdir().unwrap();
        let rc = root.path().join(".postcssrc.json");
        fs::write(&rc, r#"{"from":"x.css","to":"y.css"}"#).unwrap();

        let loader = RcConfigLoader::new(module_loader()).stop_at(root.path());
        let err = find(&loader, &root.path().join("a.css")).unwrap_err();
        assert!(matches!(err, StylesmithError::Config(ConfigError::ReservedOptions { .. })));
        assert_eq!(
            err.to_string(),
            format!(r#"Can not set "from" and "to" options in config file "{}""#, rc.display())
        );
    }

    #[test]
    fn test_unknown_plugin_in_config() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(".postcssrc.json"), r#"{"plugins":["missing"]}"#).unwrap();

        let loader = RcConfigLoader::new(module_loader()).stop_at(root.path());
        let err = find(&loader, &root.path().join("a.css")).unwrap_err();
        assert!(err.is_plugin_resolution());
    }

    #[test]
    fn test_malformed_config() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(".postcssrc.json"), "{").unwrap();

        let loader = RcConfigLoader::new(module_loader()).stop_at(root.path());
        let err = find(&loader, &root.path().join("a.css")).unwrap_err();
        assert!(matches!(err, StylesmithError::Config(ConfigError::InvalidConfigFile { .. })));
    }
}
