//! Plugin options and their normalization
//!
//! Callers pass an [`OptionsInput`]: a partial [`InputOptions`], a bare plugin
//! declaration, or a generator that computes either from the file table.
//! [`normalize_options`] resolves it against [`Options::defaults`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use stylesmith_css::{AcceptedPlugin, ProcessOptions};

use crate::error::{ConfigError, OptionsOrigin, Result};
use crate::files::{BuildContext, FileTable};
use crate::plugins::{ModuleLoader, PluginsInput, load_plugins};

/// Patterns used when none are given
pub const DEFAULT_PATTERN: [&str; 1] = ["**/*.css"];

pub type RenamerFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub type OptionsGenerator =
    Arc<dyn Fn(&FileTable, &BuildContext, &Options) -> BoxFuture<'static, Result<OptionsInput>> + Send + Sync>;

/// Maps an input key to its output key
#[derive(Clone, Default)]
pub enum Renamer {
    /// Swap the extension for `.css`
    #[default]
    Default,
    /// Keep the key
    Identity,
    Custom(RenamerFn),
}

impl Renamer {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Renamer::Custom(Arc::new(f))
    }

    pub fn rename(&self, filename: &str) -> String {
        match self {
            Renamer::Default => default_rename(filename),
            Renamer::Identity => filename.to_string(),
            Renamer::Custom(f) => f(filename),
        }
    }
}

impl fmt::Debug for Renamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renamer::Default => write!(f, "Default"),
            Renamer::Identity => write!(f, "Identity"),
            Renamer::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// `dir/name.ext` becomes `dir/name.css`
fn default_rename(filename: &str) -> String {
    Path::new(filename)
        .with_extension("css")
        .to_string_lossy()
        .into_owned()
}

/// How a caller asks for renaming
#[derive(Clone)]
pub enum RenamerInput {
    /// `true` uses the default renamer, `false` keeps keys unchanged
    Enabled(bool),
    Custom(RenamerFn),
}

impl RenamerInput {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        RenamerInput::Custom(Arc::new(f))
    }
}

impl From<bool> for RenamerInput {
    fn from(enabled: bool) -> Self {
        RenamerInput::Enabled(enabled)
    }
}

impl From<RenamerInput> for Renamer {
    fn from(input: RenamerInput) -> Self {
        match input {
            RenamerInput::Enabled(true) => Renamer::Default,
            RenamerInput::Enabled(false) => Renamer::Identity,
            RenamerInput::Custom(f) => Renamer::Custom(f),
        }
    }
}

/// Fully resolved options
#[derive(Debug, Clone)]
pub struct Options {
    pub pattern: Vec<String>,
    pub plugins: Vec<AcceptedPlugin>,
    pub options: ProcessOptions,
    pub renamer: Renamer,
    /// Metadata key that receives the dependency record; `None` disables it
    pub dependencies_key: Option<String>,
}

impl Options {
    pub fn defaults() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.iter().map(|p| p.to_string()).collect(),
            plugins: Vec::new(),
            options: ProcessOptions::default(),
            renamer: Renamer::Default,
            dependencies_key: None,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Options as given by the caller; unset fields fall back to the defaults
#[derive(Debug, Clone, Default)]
pub struct InputOptions {
    pub pattern: Option<Vec<String>>,
    pub plugins: Option<PluginsInput>,
    pub options: Option<ProcessOptions>,
    pub renamer: Option<RenamerInput>,
    pub dependencies_key: Option<String>,
}

impl InputOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(vec![pattern.into()]);
        self
    }

    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pattern = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn plugins(mut self, plugins: impl Into<PluginsInput>) -> Self {
        self.plugins = Some(plugins.into());
        self
    }

    pub fn options(mut self, options: ProcessOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn renamer(mut self, renamer: impl Into<RenamerInput>) -> Self {
        self.renamer = Some(renamer.into());
        self
    }

    pub fn dependencies_key(mut self, key: impl Into<String>) -> Self {
        self.dependencies_key = Some(key.into());
        self
    }
}

impl fmt::Debug for RenamerInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenamerInput::Enabled(enabled) => f.debug_tuple("Enabled").field(enabled).finish(),
            RenamerInput::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Everything accepted as the plugin's argument
#[derive(Clone)]
pub enum OptionsInput {
    Partial(InputOptions),
    /// Shorthand for `InputOptions { plugins, .. }`
    Plugins(PluginsInput),
    /// Computes the options once the file table is known
    Generator(OptionsGenerator),
}

impl OptionsInput {
    /// A generator that computes options synchronously
    pub fn generator<F>(f: F) -> Self
    where
        F: Fn(&FileTable, &BuildContext, &Options) -> OptionsInput + Send + Sync + 'static,
    {
        OptionsInput::Generator(Arc::new(
            move |files: &FileTable, build: &BuildContext, defaults: &Options| -> BoxFuture<'static, Result<OptionsInput>> {
                let input = f(files, build, defaults);
                Box::pin(async move { Ok(input) })
            },
        ))
    }
}

impl Default for OptionsInput {
    fn default() -> Self {
        OptionsInput::Partial(InputOptions::default())
    }
}

impl From<InputOptions> for OptionsInput {
    fn from(options: InputOptions) -> Self {
        OptionsInput::Partial(options)
    }
}

impl From<PluginsInput> for OptionsInput {
    fn from(plugins: PluginsInput) -> Self {
        OptionsInput::Plugins(plugins)
    }
}

impl fmt::Debug for OptionsInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsInput::Partial(options) => f.debug_tuple("Partial").field(options).finish(),
            OptionsInput::Plugins(plugins) => f.debug_tuple("Plugins").field(plugins).finish(),
            OptionsInput::Generator(_) => write!(f, "Generator(..)"),
        }
    }
}

/// Reject `from`/`to` where only the plugin may set them
pub fn validate_reserved(options: &ProcessOptions, origin: OptionsOrigin) -> std::result::Result<(), ConfigError> {
    let fields = options.positional_fields();
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ReservedOptions { fields, origin })
    }
}

/// Resolve caller input into full options
///
/// Generators run first and may return any other form. Plugin declarations
/// are resolved through `loader`.
pub async fn normalize_options(
    files: &FileTable,
    build: &BuildContext,
    input: &OptionsInput,
    defaults: &Options,
    loader: &dyn ModuleLoader,
) -> Result<Options> {
    let mut input = input.clone();
    let partial = loop {
        match input {
            OptionsInput::Generator(generate) => input = generate(files, build, defaults).await?,
            OptionsInput::Partial(partial) => break partial,
            OptionsInput::Plugins(plugins) => {
                break InputOptions {
                    plugins: Some(plugins),
                    ..InputOptions::default()
                };
            }
        }
    };

    let options = partial.options.unwrap_or_else(|| defaults.options.clone());
    validate_reserved(&options, OptionsOrigin::PluginOptions)?;

    let plugins = match &partial.plugins {
        Some(plugins) => load_plugins(plugins, loader)?,
        None => defaults.plugins.clone(),
    };

    Ok(Options {
        pattern: partial.pattern.unwrap_or_else(|| defaults.pattern.clone()),
        plugins,
        options,
        renamer: partial.renamer.map(Renamer::from).unwrap_or_else(|| defaults.renamer.clone()),
        dependencies_key: partial.dependencies_key.or_else(|| defaults.dependencies_key.clone()),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use stylesmith_css::transformer_fn;

    use super::*;
    use crate::error::StylesmithError;
    use crate::plugins::RegistryModuleLoader;

    fn normalize(input: OptionsInput) -> Result<Options> {
        let files = FileTable::new();
        let build = BuildContext::new("/site/src", "/site/build");
        pollster::block_on(normalize_options(
            &files,
            &build,
            &input,
            &Options::defaults(),
            &RegistryModuleLoader::new(),
        ))
    }

    #[test]
    fn test_default_renamer() {
        assert_eq!(Renamer::Default.rename("a.sss"), "a.css");
        assert_eq!(Renamer::Default.rename("dir/a.min.scss"), "dir/a.min.css");
        assert_eq!(Renamer::Default.rename(".hidden"), ".hidden.css");
        assert_eq!(Renamer::Default.rename("a.css"), "a.css");
        assert_eq!(Renamer::Identity.rename("a.sss"), "a.sss");
    }

    #[test]
    fn test_renamer_input() {
        assert!(matches!(Renamer::from(RenamerInput::Enabled(true)), Renamer::Default));
        assert!(matches!(Renamer::from(RenamerInput::Enabled(false)), Renamer::Identity));
        let custom = Renamer::from(RenamerInput::custom(|name| format!("out/{}", name)));
        assert_eq!(custom.rename("a.css"), "out/a.css");
    }

    #[test]
    fn test_defaults_fill_unset_fields() {
        let options = normalize(InputOptions::new().dependencies_key("deps").into()).unwrap();
        assert_eq!(options.pattern, DEFAULT_PATTERN.map(String::from).to_vec());
        assert!(options.plugins.is_empty());
        assert_eq!(options.dependencies_key.as_deref(), Some("deps"));
        assert!(matches!(options.renamer, Renamer::Default));
    }

    #[test]
    fn test_bare_plugin_list() {
        let noop = transformer_fn("noop", |_, _| Ok(()));
        let options = normalize(PluginsInput::List(vec![noop.into()]).into()).unwrap();
        assert_eq!(options.plugins.len(), 1);
    }

    #[test]
    fn test_generator_sees_the_file_table() {
        let input = OptionsInput::generator(|files, _build, _defaults| {
            InputOptions::new().pattern(format!("{}-files", files.len())).into()
        });
        let options = normalize(input).unwrap();
        assert_eq!(options.pattern, vec!["0-files"]);
    }

    #[test]
    fn test_reserved_fields_are_rejected() {
        let opts = ProcessOptions {
            from: Some(PathBuf::from("/x.css")),
            ..ProcessOptions::default()
        };
        let err = normalize(InputOptions::new().options(opts).into()).unwrap_err();
        assert!(matches!(err, StylesmithError::Config(ConfigError::ReservedOptions { .. })));
        assert_eq!(err.to_string(), r#"Can not set "from" option in plugin options"#);
    }
}
