//! Transformer units
//!
//! A transformer mutates a parsed [`Stylesheet`] in place. Transformers can be
//! handed to a processor directly, bundled inside another [`Processor`], or
//! wrapped in a single-field object; [`AcceptedPlugin`] covers all three and
//! [`AcceptedPlugin::normalize`] flattens them into one list.
//!
//! # Example
//!
//! ```ignore
//! use stylesmith_css::{AcceptedPlugin, transformer_fn};
//!
//! let uppercase = transformer_fn("uppercase", |root, _ctx| {
//!     root.walk_decls_mut(|decl| decl.value = decl.value.to_uppercase());
//!     Ok(())
//! });
//! let plugin = AcceptedPlugin::Transformer(uppercase);
//! assert_eq!(plugin.normalize().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::node::Stylesheet;
use crate::processor::Processor;
use crate::result::TransformContext;

/// A content transformer
///
/// Must be `Send + Sync` so one transformer can serve many files at once.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Name used in logs and in messages the transformer emits
    fn name(&self) -> &str;

    /// Mutate `root`. Report warnings and dependencies through `ctx`.
    async fn transform(&self, root: &mut Stylesheet, ctx: &mut TransformContext) -> Result<()>;
}

/// A transformer backed by a synchronous closure
pub struct FnTransformer<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> Transformer for FnTransformer<F>
where
    F: Fn(&mut Stylesheet, &mut TransformContext) -> Result<()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(&self, root: &mut Stylesheet, ctx: &mut TransformContext) -> Result<()> {
        (self.f)(root, ctx)
    }
}

/// Wrap a closure as a transformer
pub fn transformer_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Transformer>
where
    F: Fn(&mut Stylesheet, &mut TransformContext) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnTransformer {
        name: name.into(),
        f,
    })
}

/// Anything a processor accepts as a plugin
#[derive(Clone)]
pub enum AcceptedPlugin {
    Transformer(Arc<dyn Transformer>),
    /// A processor whose transformers are spliced in
    Processor(Processor),
    /// An object holding one nested plugin
    Wrapped(Box<AcceptedPlugin>),
}

impl AcceptedPlugin {
    pub fn wrap(plugin: AcceptedPlugin) -> Self {
        AcceptedPlugin::Wrapped(Box::new(plugin))
    }

    /// Flatten into the transformers to run, in order
    pub fn normalize(&self) -> Vec<Arc<dyn Transformer>> {
        match self {
            AcceptedPlugin::Transformer(t) => vec![Arc::clone(t)],
            AcceptedPlugin::Processor(p) => p.plugins().to_vec(),
            AcceptedPlugin::Wrapped(inner) => inner.normalize(),
        }
    }
}

impl From<Arc<dyn Transformer>> for AcceptedPlugin {
    fn from(transformer: Arc<dyn Transformer>) -> Self {
        AcceptedPlugin::Transformer(transformer)
    }
}

impl From<Processor> for AcceptedPlugin {
    fn from(processor: Processor) -> Self {
        AcceptedPlugin::Processor(processor)
    }
}

impl fmt::Debug for AcceptedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptedPlugin::Transformer(t) => f.debug_tuple("Transformer").field(&t.name()).finish(),
            AcceptedPlugin::Processor(p) => f.debug_tuple("Processor").field(p).finish(),
            AcceptedPlugin::Wrapped(inner) => f.debug_tuple("Wrapped").field(inner).finish(),
        }
    }
}
