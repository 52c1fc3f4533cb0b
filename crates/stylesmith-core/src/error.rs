//! Error types for stylesmith-core

use std::path::PathBuf;

use stylesmith_css::PluginError;
use stylesmith_source_map::SourceMapError;
use thiserror::Error;

/// Where reserved options were found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsOrigin {
    PluginOptions,
    ConfigFile(PathBuf),
}

impl std::fmt::Display for OptionsOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionsOrigin::PluginOptions => write!(f, "plugin options"),
            OptionsOrigin::ConfigFile(file) => write!(f, "config file \"{}\"", file.display()),
        }
    }
}

/// Invalid configuration, whether passed in or discovered on disk
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `from` and/or `to` were set where only the plugin may set them
    #[error("Can not set {} in {origin}", describe_fields(.fields))]
    ReservedOptions {
        fields: Vec<&'static str>,
        origin: OptionsOrigin,
    },

    #[error("Invalid config file \"{}\": {message}", .file.display())]
    InvalidConfigFile { file: PathBuf, message: String },

    #[error("Invalid pattern \"{pattern}\": {message}")]
    InvalidPattern { pattern: String, message: String },
}

fn describe_fields(fields: &[&'static str]) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("\"{}\"", f)).collect();
    match quoted.len() {
        1 => format!("{} option", quoted[0]),
        _ => format!("{} options", quoted.join(" and ")),
    }
}

#[derive(Debug, Error)]
pub enum StylesmithError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A named transformer module could not be imported
    #[error("Loading PostCSS Plugin failed: {message}")]
    PluginLoad { message: String },

    /// Options were given for a module that exports nothing callable
    #[error("Loading PostCSS Plugin failed: Module does not export function '{name}'")]
    PluginType { name: String },

    /// A resolved value is not a usable plugin; `path` is e.g. `[0]['./x']`
    #[error("Invalid PostCSS Plugin found at: plugins{path}")]
    InvalidPlugin { path: String },

    #[error(transparent)]
    Transform(#[from] PluginError),

    #[error(transparent)]
    SourceMap(#[from] SourceMapError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StylesmithError {
    /// Whether this error came from resolving plugins
    pub fn is_plugin_resolution(&self) -> bool {
        matches!(
            self,
            StylesmithError::PluginLoad { .. }
                | StylesmithError::PluginType { .. }
                | StylesmithError::InvalidPlugin { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StylesmithError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_option_messages() {
        let err = ConfigError::ReservedOptions {
            fields: vec!["from"],
            origin: OptionsOrigin::PluginOptions,
        };
        assert_eq!(err.to_string(), r#"Can not set "from" option in plugin options"#);

        let err = ConfigError::ReservedOptions {
            fields: vec!["from", "to"],
            origin: OptionsOrigin::ConfigFile("/site/.postcssrc".into()),
        };
        assert_eq!(
            err.to_string(),
            r#"Can not set "from" and "to" options in config file "/site/.postcssrc""#
        );
    }

    #[test]
    fn test_plugin_error_messages() {
        let err = StylesmithError::InvalidPlugin {
            path: "[0][1]['./x']".into(),
        };
        assert_eq!(err.to_string(), "Invalid PostCSS Plugin found at: plugins[0][1]['./x']");
        assert!(err.is_plugin_resolution());

        let err = StylesmithError::PluginType {
            name: "./plugin-01".into(),
        };
        assert_eq!(
            err.to_string(),
            "Loading PostCSS Plugin failed: Module does not export function './plugin-01'"
        );
    }
}
