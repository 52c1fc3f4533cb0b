//! Shared helpers for the pipeline tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use stylesmith_core::{BuildContext, FileRecord, FileTable, NoConfigLoader, Result, StylesmithPlugin};
use stylesmith_css::{Node, Transformer, transformer_fn};
use stylesmith_source_map::RawSourceMap;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn build() -> BuildContext {
    BuildContext::new("/site/src", "/site/build")
}

pub fn table(entries: &[(&str, &str)]) -> FileTable {
    entries.iter().map(|(key, css)| (*key, FileRecord::new(*css))).collect()
}

pub fn text(files: &FileTable, key: &str) -> String {
    files
        .get(key)
        .and_then(|record| record.text())
        .unwrap_or_else(|| panic!("no text at {}", key))
        .into_owned()
}

pub fn map_at(files: &FileTable, key: &str) -> RawSourceMap {
    RawSourceMap::from_json(&text(files, key)).unwrap()
}

/// Run with configuration discovery turned off
pub fn run(plugin: StylesmithPlugin, files: &mut FileTable) -> Result<()> {
    run_in(plugin, files, &build())
}

pub fn run_in(plugin: StylesmithPlugin, files: &mut FileTable, build: &BuildContext) -> Result<()> {
    init_tracing();
    let plugin = plugin.with_config_loader(Arc::new(NoConfigLoader));
    pollster::block_on(plugin.run(files, build))
}

/// Duplicates every declaration
pub fn doubler() -> Arc<dyn Transformer> {
    transformer_fn("doubler", |root, _| {
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
    })
}

/// Drops top-level `@import`s and reports each as a dependency
pub fn importer() -> Arc<dyn Transformer> {
    transformer_fn("importer", |root, ctx| {
        let parent = ctx.opts().from.clone();
        let dir = parent.as_deref().and_then(Path::parent).map(Path::to_path_buf).unwrap_or_default();

        let mut imported = Vec::new();
        root.nodes.retain(|node| match node {
            Node::AtRule(rule) if rule.name == "import" => {
                imported.push(rule.params.trim_matches(|c| c == '"' || c == '\'').to_string());
                false
            }
            _ => true,
        });
        for file in imported {
            ctx.add_dependency(dir.join(file), parent.clone());
        }
        Ok(())
    })
}
