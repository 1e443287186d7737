//! Registration façade: factory definition and the process-wide default
//! adapter.

use std::future::Future;
use std::sync::{Arc, LazyLock, RwLock};

use fabrica_core::{AttrMap, ModelAdapter, ModelDescriptor, Result};

use crate::adapters::ObjectAdapter;
use crate::factory::{AttributesContext, Factory, async_generator, sync_generator};
use crate::sequence;

static DEFAULT_ADAPTER: LazyLock<RwLock<Arc<dyn ModelAdapter>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ObjectAdapter::new())));

/// Define a factory bound to the process-wide default adapter.
///
/// The binding is late: the factory reads the default adapter at call time,
/// so a later [`set_adapter`] swap is observed by factories defined earlier.
pub fn define<F>(model: impl Into<ModelDescriptor>, f: F) -> Factory
where
    F: Fn(&AttributesContext) -> AttrMap + Send + Sync + 'static,
{
    Factory::new(model, sync_generator(f))
}

/// [`define`] with an async attributes generator.
pub fn define_async<F, Fut>(model: impl Into<ModelDescriptor>, f: F) -> Factory
where
    F: Fn(AttributesContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AttrMap>> + Send + 'static,
{
    Factory::new(model, async_generator(f))
}

/// Define a factory pinned to an explicit adapter. Pinning is permanent:
/// later [`set_adapter`] swaps do not affect it.
pub fn define_with_adapter<F>(
    model: impl Into<ModelDescriptor>,
    f: F,
    adapter: Arc<dyn ModelAdapter>,
) -> Factory
where
    F: Fn(&AttributesContext) -> AttrMap + Send + Sync + 'static,
{
    Factory::with_adapter(model, sync_generator(f), adapter)
}

/// Swap the process-wide default adapter.
pub fn set_adapter(adapter: Arc<dyn ModelAdapter>) {
    let mut slot = DEFAULT_ADAPTER
        .write()
        .unwrap_or_else(|err| err.into_inner());
    *slot = adapter;
}

/// The current process-wide default adapter.
pub fn default_adapter() -> Arc<dyn ModelAdapter> {
    DEFAULT_ADAPTER
        .read()
        .unwrap_or_else(|err| err.into_inner())
        .clone()
}

/// Reset sequence counters. Call between independent test runs.
pub fn clean_up() {
    sequence::clean_up();
}
