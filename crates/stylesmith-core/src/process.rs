//! Running one file through its transformer chain

use stylesmith_css::{AcceptedPlugin, MapOptions, MapSetting, Message, PluginError, PrevMap, ProcessOptions, Processor};

use crate::error::Result;

/// Output of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedCss {
    pub css: String,
    /// Map JSON, present when a map was generated externally
    pub map: Option<String>,
    pub messages: Vec<Message>,
}

/// Attach the text of a map found in the file table as the previous map
///
/// Only applies when a map was requested and no previous map is set yet.
pub fn options_with_prev_map(options: &ProcessOptions, prev: Option<&str>) -> ProcessOptions {
    let Some(prev) = prev else {
        return options.clone();
    };

    let map = match &options.map {
        Some(MapSetting::Bool(true)) => MapOptions {
            prev: Some(PrevMap::Text(prev.to_string())),
            ..MapOptions::default()
        },
        Some(MapSetting::Options(map)) if map.prev.is_none() => MapOptions {
            prev: Some(PrevMap::Text(prev.to_string())),
            ..map.clone()
        },
        _ => return options.clone(),
    };

    ProcessOptions {
        map: Some(MapSetting::Options(map)),
        ..options.clone()
    }
}

/// Parse, transform, and stringify `contents`
///
/// Warnings are logged. A syntax error is logged with a source excerpt and
/// yields `Ok(None)` so the file is left untouched; any other transformer
/// failure is returned.
pub async fn process_css(
    plugins: &[AcceptedPlugin],
    contents: &[u8],
    options: &ProcessOptions,
) -> Result<Option<ProcessedCss>> {
    let css = String::from_utf8_lossy(contents);
    let processor = Processor::new(plugins.to_vec());

    let result = match processor.process(&css, options).await {
        Ok(result) => result,
        Err(PluginError::Syntax(error)) => {
            tracing::error!("{}\n{}", error.message(), error.show_source_code());
            return Ok(None);
        }
        Err(error) => return Err(error.into()),
    };

    for warning in result.warnings() {
        tracing::warn!("{}", warning);
    }

    Ok(Some(ProcessedCss {
        css: result.css,
        map: result.map,
        messages: result.messages,
    }))
}
