//! The build-pipeline plugin
//!
//! [`StylesmithPlugin::run`] selects stylesheets from the file table, runs
//! each through its transformer chain, and writes outputs (and maps) back.
//! Files are processed concurrently; the table is shared behind a mutex that
//! is only held for lookups and writes, never across a suspension point.

use std::sync::Arc;

use futures::future::try_join_all;
use stylesmith_css::AcceptedPlugin;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{ConfigLoader, RcConfigLoader, load_config};
use crate::error::Result;
use crate::files::{BuildContext, FileRecord, FileTable, matched_filenames, valid_files};
use crate::options::{Options, OptionsInput, normalize_options};
use crate::output::{dependency_record, write_output};
use crate::plugins::{ModuleLoader, RegistryModuleLoader};
use crate::process::{options_with_prev_map, process_css};
use crate::source_map::find_source_map;

pub struct StylesmithPlugin {
    input: OptionsInput,
    defaults: Options,
    module_loader: Arc<dyn ModuleLoader>,
    /// `None` searches for rc files with the plugin's module loader
    config_loader: Option<Arc<dyn ConfigLoader>>,
}

/// What every file task shares
struct RunState<'a> {
    table: Mutex<FileTable>,
    /// The table as it was before any output was written
    snapshot: Option<FileTable>,
    build: &'a BuildContext,
    options: Options,
    config_loader: &'a dyn ConfigLoader,
}

impl StylesmithPlugin {
    pub fn new(input: impl Into<OptionsInput>) -> Self {
        Self {
            input: input.into(),
            defaults: Options::defaults(),
            module_loader: Arc::new(RegistryModuleLoader::new()),
            config_loader: None,
        }
    }

    /// Resolve plugin names through `loader`
    pub fn with_module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.module_loader = loader;
        self
    }

    /// Replace configuration discovery
    pub fn with_config_loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.config_loader = Some(loader);
        self
    }

    /// Process every matching file in `files`
    ///
    /// The first failing file aborts the run and its error is returned. The
    /// table keeps whatever outputs were written before that point.
    pub async fn run(&self, files: &mut FileTable, build: &BuildContext) -> Result<()> {
        let options = normalize_options(files, build, &self.input, &self.defaults, self.module_loader.as_ref()).await?;

        let matched = matched_filenames(files, &options.pattern)?;
        let targets = valid_files(files, &matched);
        debug!(matched = matched.len(), valid = targets.len(), "Selected stylesheets");

        let rc_loader;
        let config_loader: &dyn ConfigLoader = match &self.config_loader {
            Some(loader) => loader.as_ref(),
            None => {
                rc_loader = RcConfigLoader::new(Arc::clone(&self.module_loader));
                &rc_loader
            }
        };

        let snapshot = options.dependencies_key.is_some().then(|| files.clone());
        let state = RunState {
            table: Mutex::new(std::mem::take(files)),
            snapshot,
            build,
            options,
            config_loader,
        };

        let result = try_join_all(
            targets
                .into_iter()
                .map(|(filename, record)| process_file(&state, filename, record)),
        )
        .await;

        *files = state.table.into_inner();
        result.map(|_| ())
    }
}

async fn process_file(state: &RunState<'_>, filename: String, record: FileRecord) -> Result<()> {
    let options = &state.options;
    let build = state.build;

    let new_filename = options.renamer.rename(&filename);
    let from = build.source_path(&filename);
    let to = build.destination_path(&new_filename);
    debug!(file = %filename, output = %new_filename, "Processing stylesheet");

    let positioned = options.options.with_positions(from.clone(), to);
    let (plugins, process_options): (Vec<AcceptedPlugin>, _) =
        match load_config(&options.plugins, &positioned, &from, build, state.config_loader).await? {
            Some(config) => {
                debug!(file = %filename, config = %config.file.display(), "Using configuration file");
                (config.plugins, config.options)
            }
            None => (options.plugins.clone(), positioned),
        };

    let contents = record.text().unwrap_or_default().into_owned();
    let prev = {
        let files = state.table.lock().await;
        find_source_map(&files, &filename, &contents, build)
    };
    let prev_text = prev.and_then(|map| {
        debug!(file = %filename, map = %map.key, "Found previous source map");
        map.rebased_text(from.parent().unwrap_or(build.source()))
    });
    let process_options = options_with_prev_map(&process_options, prev_text.as_deref());

    let Some(processed) = process_css(&plugins, contents.as_bytes(), &process_options).await? else {
        debug!(file = %filename, "Skipped after syntax error");
        return Ok(());
    };

    let deps = match (&options.dependencies_key, &state.snapshot) {
        (Some(key), Some(snapshot)) => Some((
            key.as_str(),
            dependency_record(snapshot, build, &filename, &record, &processed.messages),
        )),
        _ => None,
    };

    let mut files = state.table.lock().await;
    write_output(
        &mut files,
        build,
        &filename,
        &new_filename,
        &processed,
        &record,
        deps.as_ref().map(|(key, deps)| (*key, deps)),
    )?;
    debug!(file = %filename, output = %new_filename, "Wrote stylesheet");
    Ok(())
}
