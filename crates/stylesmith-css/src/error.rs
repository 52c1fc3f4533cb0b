//! Error types for stylesheet processing

use std::path::PathBuf;
use std::sync::Arc;

use stylesmith_source_map::SourceMapError;
use thiserror::Error;

use crate::node::Input;

/// Malformed stylesheet input
///
/// Carries enough of the input to render a source excerpt with
/// [`CssSyntaxError::show_source_code`].
#[derive(Debug, Clone)]
pub struct CssSyntaxError {
    pub reason: String,
    pub file: Option<PathBuf>,
    /// 1-based
    pub line: usize,
    /// 1-based
    pub column: usize,
    /// Byte offset of the error in the input
    pub offset: usize,
    input: Arc<Input>,
}

impl CssSyntaxError {
    pub fn new(reason: impl Into<String>, input: Arc<Input>, offset: usize) -> Self {
        let offset = input.char_start(offset);
        let (line, column) = line_column(&input.css, offset);
        Self {
            reason: reason.into(),
            file: input.file.clone(),
            line,
            column,
            offset,
            input,
        }
    }

    /// The full error message (`file:line:column: reason`)
    pub fn message(&self) -> String {
        let file = self
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "<css input>".to_string());
        format!("{}:{}:{}: {}", file, self.line, self.column, self.reason)
    }

    /// Render the offending lines with a marker under the error position
    pub fn show_source_code(&self) -> String {
        use ariadne::{Config, Label, Report, ReportKind, Source};

        let name = self
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "<css input>".to_string());

        let css = self.input.css.as_str();
        // ariadne spans are character based
        let start = css[..self.offset].chars().count();
        let end = if self.offset < css.len() { start + 1 } else { start };

        let report = Report::build(ReportKind::Error, name.clone(), start)
            .with_config(Config::default().with_color(false))
            .with_message(&self.reason)
            .with_label(Label::new((name.clone(), start..end)).with_message(&self.reason))
            .finish();

        let mut output = Vec::new();
        match report.write((name, Source::from(css)), &mut output) {
            Ok(()) => String::from_utf8_lossy(&output).into_owned(),
            Err(_) => String::new(),
        }
    }
}

impl std::fmt::Display for CssSyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for CssSyntaxError {}

fn line_column(css: &str, offset: usize) -> (usize, usize) {
    let before = &css[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Failure of a transformer, or of processing as a whole
#[derive(Debug, Error)]
pub enum PluginError {
    /// Malformed input, whether found while parsing or raised by a transformer
    #[error("{0}")]
    Syntax(#[from] CssSyntaxError),

    /// A transformer failed for any other reason
    #[error("{plugin}: {message}")]
    Failed { plugin: String, message: String },

    /// A previous map could not be read
    #[error(transparent)]
    SourceMap(#[from] SourceMapError),
}

impl PluginError {
    pub fn failed(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    pub fn is_syntax_error(&self) -> bool {
        matches!(self, PluginError::Syntax(_))
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn input(css: &str) -> Arc<Input> {
        Arc::new(Input {
            css: css.to_string(),
            file: Some(PathBuf::from("/site/src/a.css")),
        })
    }

    #[test]
    fn test_position_is_one_based() {
        let err = CssSyntaxError::new("Unknown word", input("a {\n  color black\n}"), 6);
        assert_eq!((err.line, err.column), (2, 3));
        assert_eq!(err.to_string(), "/site/src/a.css:2:3: Unknown word");
    }

    #[test]
    fn test_show_source_code_points_at_error() {
        let err = CssSyntaxError::new("Unclosed block", input("a {\n  color: black\n"), 2);
        let excerpt = err.show_source_code();
        assert!(excerpt.contains("Unclosed block"));
        assert!(excerpt.contains("a {"));
    }

    #[test]
    fn test_plugin_error_kinds() {
        let syntax: PluginError = CssSyntaxError::new("Unknown word", input("x"), 0).into();
        assert!(syntax.is_syntax_error());
        let failed = PluginError::failed("doubler", "boom");
        assert!(!failed.is_syntax_error());
        assert_eq!(failed.to_string(), "doubler: boom");
    }
}
