use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use fabrica_core::{
    AttrMap, AttrValue, ModelAdapter, ModelDescriptor, ResolveMode, Result, map_into_value,
    merge_deep,
};

use crate::association::Association;
use crate::registry;

/// Context handed to an attributes generator on every build/create call.
#[derive(Debug, Clone, Default)]
pub struct AttributesContext {
    /// Caller-supplied values that branch default-attribute logic but are not
    /// part of the persisted shape.
    pub transient_params: Option<Value>,
}

impl AttributesContext {
    pub fn new(transient_params: Option<Value>) -> Self {
        Self { transient_params }
    }

    /// Look up one transient parameter by key.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.transient_params.as_ref().and_then(|p| p.get(key))
    }
}

/// Produces the default attribute tree for a factory.
///
/// Invoked fresh on every build/create call, so associations embedded in the
/// returned tree are new instances scoped to that one resolution pass.
#[async_trait]
pub trait AttributesGenerator: Send + Sync {
    async fn attributes(&self, ctx: &AttributesContext) -> Result<AttrMap>;
}

struct FnGenerator<F>(F);

#[async_trait]
impl<F> AttributesGenerator for FnGenerator<F>
where
    F: Fn(&AttributesContext) -> AttrMap + Send + Sync,
{
    async fn attributes(&self, ctx: &AttributesContext) -> Result<AttrMap> {
        Ok((self.0)(ctx))
    }
}

struct AsyncFnGenerator<F, Fut>(F, PhantomData<fn() -> Fut>);

#[async_trait]
impl<F, Fut> AttributesGenerator for AsyncFnGenerator<F, Fut>
where
    F: Fn(AttributesContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<AttrMap>> + Send,
{
    async fn attributes(&self, ctx: &AttributesContext) -> Result<AttrMap> {
        (self.0)(ctx.clone()).await
    }
}

/// Wrap a plain closure as an attributes generator.
pub fn sync_generator<F>(f: F) -> Arc<dyn AttributesGenerator>
where
    F: Fn(&AttributesContext) -> AttrMap + Send + Sync + 'static,
{
    Arc::new(FnGenerator(f))
}

/// Wrap an async closure as an attributes generator.
pub fn async_generator<F, Fut>(f: F) -> Arc<dyn AttributesGenerator>
where
    F: Fn(AttributesContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AttrMap>> + Send + 'static,
{
    Arc::new(AsyncFnGenerator(f, PhantomData))
}

/// Runs the base generator, then deep-merges the extension's output on top.
struct ExtendedGenerator {
    base: Arc<dyn AttributesGenerator>,
    extension: Arc<dyn AttributesGenerator>,
}

#[async_trait]
impl AttributesGenerator for ExtendedGenerator {
    async fn attributes(&self, ctx: &AttributesContext) -> Result<AttrMap> {
        let base = self.base.attributes(ctx).await?;
        let extension = self.extension.attributes(ctx).await?;
        Ok(merge_deep(&base, &extension))
    }
}

/// Ignores caller transient params in favor of a baked-in set.
struct PinnedParamsGenerator {
    inner: Arc<dyn AttributesGenerator>,
    params: Value,
}

#[async_trait]
impl AttributesGenerator for PinnedParamsGenerator {
    async fn attributes(&self, _ctx: &AttributesContext) -> Result<AttrMap> {
        let ctx = AttributesContext::new(Some(self.params.clone()));
        self.inner.attributes(&ctx).await
    }
}

pub(crate) type BuildHook = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
pub(crate) type CreateHook =
    Arc<dyn Fn(Value, Arc<dyn ModelAdapter>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Per-item overrides for `build_many`/`create_many`.
#[derive(Clone)]
pub enum Partials {
    /// Item `i` gets element `i`; items past the end get plain defaults.
    PerItem(Vec<AttrMap>),
    /// Every item gets the same overrides.
    Shared(AttrMap),
}

impl Partials {
    fn for_index(&self, index: usize) -> Option<AttrMap> {
        match self {
            Partials::PerItem(items) => items.get(index).cloned(),
            Partials::Shared(map) => Some(map.clone()),
        }
    }
}

impl From<AttrMap> for Partials {
    fn from(map: AttrMap) -> Self {
        Partials::Shared(map)
    }
}

impl From<Vec<AttrMap>> for Partials {
    fn from(items: Vec<AttrMap>) -> Self {
        Partials::PerItem(items)
    }
}

/// How a factory reaches its adapter.
///
/// `Shared` reads the process-wide default at call time, so a factory defined
/// before a `registry::set_adapter` swap still observes the new adapter.
/// `Pinned` is fixed at definition and never changes.
#[derive(Clone)]
enum AdapterBinding {
    Shared,
    Pinned(Arc<dyn ModelAdapter>),
}

/// An immutable fixture factory.
///
/// Every customizing method (`extend`, `extend_params`, `after_build`,
/// `after_create`, `mutate`) returns a new factory sharing unmodified
/// substructure; the receiver is untouched.
#[derive(Clone)]
pub struct Factory {
    model: ModelDescriptor,
    generator: Arc<dyn AttributesGenerator>,
    binding: AdapterBinding,
    after_build: Vec<BuildHook>,
    after_create: Vec<CreateHook>,
}

impl Factory {
    /// A factory bound to the process-wide default adapter.
    pub fn new(model: impl Into<ModelDescriptor>, generator: Arc<dyn AttributesGenerator>) -> Self {
        Self {
            model: model.into(),
            generator,
            binding: AdapterBinding::Shared,
            after_build: Vec::new(),
            after_create: Vec::new(),
        }
    }

    /// A factory pinned to an explicit adapter. Later default-adapter swaps
    /// do not affect it.
    pub fn with_adapter(
        model: impl Into<ModelDescriptor>,
        generator: Arc<dyn AttributesGenerator>,
        adapter: Arc<dyn ModelAdapter>,
    ) -> Self {
        Self {
            model: model.into(),
            generator,
            binding: AdapterBinding::Pinned(adapter),
            after_build: Vec::new(),
            after_create: Vec::new(),
        }
    }

    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }

    /// Adapter in effect for this call.
    pub fn adapter(&self) -> Arc<dyn ModelAdapter> {
        match &self.binding {
            AdapterBinding::Shared => registry::default_adapter(),
            AdapterBinding::Pinned(adapter) => adapter.clone(),
        }
    }

    /// Build an in-memory instance from defaults deep-merged with `overrides`.
    pub async fn build(
        &self,
        overrides: Option<AttrMap>,
        transient: Option<Value>,
    ) -> Result<Value> {
        debug!(model = %self.model, "building fixture");
        let merged = self
            .resolve_attributes(ResolveMode::Build, overrides, transient)
            .await?;
        let attributes = map_into_value(merged)?;
        let built = self.adapter().build(&self.model, attributes)?;
        self.run_build_hooks(built).await
    }

    /// Build `count` independent instances, collected in index order.
    pub async fn build_many(
        &self,
        count: usize,
        partials: Option<Partials>,
        transient: Option<Value>,
    ) -> Result<Vec<Value>> {
        let mut built = Vec::with_capacity(count);
        for index in 0..count {
            let overrides = partials.as_ref().and_then(|p| p.for_index(index));
            built.push(self.build(overrides, transient.clone()).await?);
        }
        Ok(built)
    }

    /// Build an instance and persist it through the adapter.
    pub async fn create(
        &self,
        overrides: Option<AttrMap>,
        transient: Option<Value>,
    ) -> Result<Value> {
        debug!(model = %self.model, "creating fixture");
        let merged = self
            .resolve_attributes(ResolveMode::Create, overrides, transient)
            .await?;
        let attributes = map_into_value(merged)?;
        let adapter = self.adapter();
        let built = adapter.build(&self.model, attributes)?;
        let saved = adapter.save(built, &self.model).await?;
        self.run_create_hooks(saved, adapter).await
    }

    /// Create `count` independent records, collected in index order.
    ///
    /// Each item runs its own full resolution pass, so associations are
    /// resolved per item: `count` rows reference `count` distinct parents.
    pub async fn create_many(
        &self,
        count: usize,
        partials: Option<Partials>,
        transient: Option<Value>,
    ) -> Result<Vec<Value>> {
        let mut created = Vec::with_capacity(count);
        for index in 0..count {
            let overrides = partials.as_ref().and_then(|p| p.for_index(index));
            created.push(self.create(overrides, transient.clone()).await?);
        }
        Ok(created)
    }

    /// A deferred reference to this factory's output. Resolution is postponed
    /// until a build/create pass reads it, and memoized per instance.
    pub fn associate(&self) -> Association {
        Association::new(self.clone())
    }

    /// A deferred reference to `count` independent instances.
    pub fn associate_many(&self, count: usize) -> Association {
        self.associate().with_count(count)
    }

    /// New factory whose generator runs this one's generator, then deep-merges
    /// the extension's output on top (extension wins).
    pub fn extend<F>(&self, f: F) -> Factory
    where
        F: Fn(&AttributesContext) -> AttrMap + Send + Sync + 'static,
    {
        self.extend_with(sync_generator(f))
    }

    /// `extend` with an arbitrary (possibly async) generator.
    pub fn extend_with(&self, extension: Arc<dyn AttributesGenerator>) -> Factory {
        let mut factory = self.clone();
        factory.generator = Arc::new(ExtendedGenerator {
            base: Arc::clone(&self.generator),
            extension,
        });
        factory
    }

    /// New factory whose generator always receives `params`, ignoring
    /// whatever transient params the caller passes. Bakes in a variant.
    pub fn extend_params(&self, params: Value) -> Factory {
        let mut factory = self.clone();
        factory.generator = Arc::new(PinnedParamsGenerator {
            inner: Arc::clone(&self.generator),
            params,
        });
        factory
    }

    /// Append a synchronous after-build hook.
    pub fn after_build<F>(&self, f: F) -> Factory
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        let hook: BuildHook = Arc::new(move |value| {
            let out = f(value);
            Box::pin(async move { out })
        });
        let mut factory = self.clone();
        factory.after_build.push(hook);
        factory
    }

    /// Append an async after-build hook.
    pub fn after_build_async<F>(&self, f: F) -> Factory
    where
        F: Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        let mut factory = self.clone();
        factory.after_build.push(Arc::new(f));
        factory
    }

    /// Append a synchronous after-create hook.
    pub fn after_create<F>(&self, f: F) -> Factory
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        let hook: CreateHook = Arc::new(move |value, _adapter| {
            let out = f(value);
            Box::pin(async move { out })
        });
        let mut factory = self.clone();
        factory.after_create.push(hook);
        factory
    }

    /// Append an async after-create hook. The hook also receives the adapter
    /// in effect, so it can mutate and re-save before returning.
    pub fn after_create_async<F>(&self, f: F) -> Factory
    where
        F: Fn(Value, Arc<dyn ModelAdapter>) -> BoxFuture<'static, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        let mut factory = self.clone();
        factory.after_create.push(Arc::new(f));
        factory
    }

    /// Morph created output into a different shape, e.g. wrapping a plain
    /// record in a domain envelope. Sugar for an after-create hook.
    pub fn mutate<F>(&self, f: F) -> Factory
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.after_create(f)
    }

    /// Run the generator, resolve association placeholders, and merge.
    ///
    /// Defaults are scanned for placeholders at the top level only; nested
    /// associations are expressed by associating inside a nested factory's
    /// generator, not by embedding one deep in a literal sub-object. Every
    /// default placeholder resolves before the merge, so a partial object
    /// override merges into the resolved association instead of replacing
    /// it. A second pass picks up placeholders the override itself
    /// introduced.
    async fn resolve_attributes(
        &self,
        mode: ResolveMode,
        overrides: Option<AttrMap>,
        transient: Option<Value>,
    ) -> Result<AttrMap> {
        let ctx = AttributesContext::new(transient);
        let defaults = self.generator.attributes(&ctx).await?;
        let resolved = resolve_tree(mode, defaults).await?;
        let merged = match overrides {
            Some(overrides) => merge_deep(&resolved, &overrides),
            None => resolved,
        };
        resolve_tree(mode, merged).await
    }

    async fn run_build_hooks(&self, mut value: Value) -> Result<Value> {
        for hook in &self.after_build {
            value = hook(value).await?;
        }
        Ok(value)
    }

    async fn run_create_hooks(
        &self,
        mut value: Value,
        adapter: Arc<dyn ModelAdapter>,
    ) -> Result<Value> {
        for hook in &self.after_create {
            value = hook(value, Arc::clone(&adapter)).await?;
        }
        Ok(value)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("model", &self.model)
            .field("after_build_hooks", &self.after_build.len())
            .field("after_create_hooks", &self.after_create.len())
            .finish_non_exhaustive()
    }
}

/// Replace top-level association placeholders with their resolved values.
async fn resolve_tree(mode: ResolveMode, tree: AttrMap) -> Result<AttrMap> {
    let mut resolved = AttrMap::with_capacity(tree.len());
    for (key, value) in tree {
        let next = match value {
            AttrValue::Association(handle) => AttrValue::from_value(handle.resolve(mode).await?),
            other => other,
        };
        resolved.insert(key, next);
    }
    Ok(resolved)
}
