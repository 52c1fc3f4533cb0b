//! What a processing run reports back besides the output text

use std::path::PathBuf;

use crate::node::Position;
use crate::options::ProcessOptions;

/// A non-fatal diagnostic raised by a transformer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub text: String,
    /// Name of the transformer that raised it
    pub plugin: Option<String>,
    pub position: Option<Position>,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(plugin) = &self.plugin {
            write!(f, "{}: ", plugin)?;
        }
        write!(f, "{}", self.text)?;
        if let Some(position) = &self.position {
            write!(f, " ({}:{})", position.line, position.column)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Warning(Warning),
    /// The output depends on `file`, which was pulled in by `parent`
    Dependency {
        plugin: Option<String>,
        file: PathBuf,
        parent: Option<PathBuf>,
    },
}

/// Handed to each transformer alongside the tree
#[derive(Debug, Clone)]
pub struct TransformContext {
    opts: ProcessOptions,
    messages: Vec<Message>,
    current_plugin: Option<String>,
}

impl TransformContext {
    pub fn new(opts: ProcessOptions) -> Self {
        Self {
            opts,
            messages: Vec::new(),
            current_plugin: None,
        }
    }

    pub fn opts(&self) -> &ProcessOptions {
        &self.opts
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn set_current_plugin(&mut self, name: Option<String>) {
        self.current_plugin = name;
    }

    pub(crate) fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.warn_at(text, None);
    }

    pub fn warn_at(&mut self, text: impl Into<String>, position: Option<Position>) {
        self.messages.push(Message::Warning(Warning {
            text: text.into(),
            plugin: self.current_plugin.clone(),
            position,
        }));
    }

    /// Record that the output depends on `file`
    pub fn add_dependency(&mut self, file: impl Into<PathBuf>, parent: Option<PathBuf>) {
        self.messages.push(Message::Dependency {
            plugin: self.current_plugin.clone(),
            file: file.into(),
            parent,
        });
    }
}

/// Output of [`crate::Processor::process`]
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub css: String,
    /// Map JSON, when the map is not inlined into `css`
    pub map: Option<String>,
    pub messages: Vec<Message>,
}

impl ProcessResult {
    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.messages.iter().filter_map(|m| match m {
            Message::Warning(w) => Some(w),
            Message::Dependency { .. } => None,
        })
    }

    /// Dependency files, in the order they were reported
    pub fn dependencies(&self) -> impl Iterator<Item = &PathBuf> {
        self.messages.iter().filter_map(|m| match m {
            Message::Dependency { file, .. } => Some(file),
            Message::Warning(_) => None,
        })
    }
}
