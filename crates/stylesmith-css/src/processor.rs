//! Running a chain of transformers over one stylesheet

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::map::{MapGenerator, PreviousMap};
use crate::node::Input;
use crate::options::ProcessOptions;
use crate::parser::parse;
use crate::plugin::{AcceptedPlugin, Transformer};
use crate::result::{ProcessResult, TransformContext};

/// An ordered, reusable list of transformers
#[derive(Clone, Default)]
pub struct Processor {
    plugins: Vec<Arc<dyn Transformer>>,
}

impl Processor {
    pub fn new(plugins: Vec<AcceptedPlugin>) -> Self {
        let mut processor = Self::default();
        for plugin in &plugins {
            processor.add(plugin);
        }
        processor
    }

    /// Append a plugin, flattening nested processors
    pub fn add(&mut self, plugin: &AcceptedPlugin) -> &mut Self {
        self.plugins.extend(plugin.normalize());
        self
    }

    pub fn plugins(&self) -> &[Arc<dyn Transformer>] {
        &self.plugins
    }

    /// Parse `css`, run every transformer in order, and stringify the result
    ///
    /// A map is produced according to `opts.map`; see [`crate::map`].
    pub async fn process(&self, css: &str, opts: &ProcessOptions) -> Result<ProcessResult> {
        let input = Arc::new(Input {
            css: css.to_string(),
            file: opts.from.clone(),
        });
        let mut root = parse(Arc::clone(&input))?;
        let previous = PreviousMap::load(&input.css, opts)?;

        let mut ctx = TransformContext::new(opts.clone());
        for plugin in &self.plugins {
            tracing::debug!(transformer = plugin.name(), "Running transformer");
            ctx.set_current_plugin(Some(plugin.name().to_string()));
            plugin.transform(&mut root, &mut ctx).await?;
        }
        ctx.set_current_plugin(None);

        let (css, map) = MapGenerator::new(&mut root, opts, previous).generate()?;
        Ok(ProcessResult {
            css,
            map,
            messages: ctx.into_messages(),
        })
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use crate::node::Node;
    use crate::plugin::transformer_fn;

    fn doubler() -> AcceptedPlugin {
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
        .into()
    }

    #[test]
    fn test_doubles_declarations() {
        let processor = Processor::new(vec![doubler()]);
        let result =
            pollster::block_on(processor.process("a { color: black }", &ProcessOptions::default()))
                .unwrap();
        assert_eq!(result.css, "a { color: black; color: black }");
        assert!(result.map.is_none());
    }

    #[test]
    fn test_transformers_run_in_order() {
        let upper = transformer_fn("upper", |root, _| {
            root.walk_decls_mut(|decl| decl.value = decl.value.to_uppercase());
            Ok(())
        });
        let processor = Processor::new(vec![upper.into(), doubler()]);
        let result = pollster::block_on(processor.process("a{color:red}", &ProcessOptions::default()))
            .unwrap();
        assert_eq!(result.css, "a{color:RED;color:RED}");
    }

    #[test]
    fn test_messages_are_collected() {
        let import = transformer_fn("import", |_, ctx| {
            ctx.add_dependency("/src/_sub.css", None);
            ctx.warn("ignored media query");
            Ok(())
        });
        let processor = Processor::new(vec![import.into()]);
        let result = pollster::block_on(processor.process("a{}", &ProcessOptions::default()))
            .unwrap();
        assert_eq!(result.dependencies().count(), 1);
        let warning = result.warnings().next().unwrap();
        assert_eq!(warning.plugin.as_deref(), Some("import"));
    }

    #[test]
    fn test_syntax_error_from_parser() {
        let processor = Processor::new(vec![doubler()]);
        let err = pollster::block_on(processor.process("a {", &ProcessOptions::default()))
            .unwrap_err();
        assert!(err.is_syntax_error());
    }

    #[test]
    fn test_transformer_failure_propagates() {
        let failing = transformer_fn("failing", |_, _| Err(PluginError::failed("failing", "boom")));
        let processor = Processor::new(vec![failing.into()]);
        let err = pollster::block_on(processor.process("a{}", &ProcessOptions::default()))
            .unwrap_err();
        assert_eq!(err.to_string(), "failing: boom");
    }

    #[test]
    fn test_debug_lists_transformer_names() {
        let processor = Processor::new(vec![doubler()]);
        assert_eq!(format!("{:?}", processor), r#"["doubler"]"#);
    }
}
