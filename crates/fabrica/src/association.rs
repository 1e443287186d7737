use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;

use fabrica_core::{
    AssociationHandle, AttrMap, AttrValue, ResolveAssociation, ResolveMode, Result,
};

use crate::factory::{Factory, Partials};

/// A deferred, memoized reference to another factory's build/create output.
///
/// Resolution is lazy: nothing is built until a factory's resolution pass (or
/// the caller) asks for it. Build and create results are cached separately,
/// since create may yield a different value (e.g. a generated id). Clones
/// share the caches, so however many attribute positions read the same
/// association, the underlying factory runs at most once per mode.
#[derive(Clone)]
pub struct Association {
    factory: Factory,
    key: Option<String>,
    overrides: Option<AttrMap>,
    transient: Option<Value>,
    count: Option<usize>,
    built: Arc<OnceCell<Value>>,
    created: Arc<OnceCell<Value>>,
}

impl Association {
    pub(crate) fn new(factory: Factory) -> Self {
        Self {
            factory,
            key: None,
            overrides: None,
            transient: None,
            count: None,
            built: Arc::new(OnceCell::new()),
            created: Arc::new(OnceCell::new()),
        }
    }

    /// Narrow to a single field of the resolved output.
    ///
    /// The derivation shares this association's caches: `get("id")` and
    /// `get("email")` derived from one association read different fields off
    /// the single underlying record, triggering only one resolution.
    pub fn get(&self, key: impl Into<String>) -> Association {
        let mut derived = self.clone();
        derived.key = Some(key.into());
        derived
    }

    /// Overrides applied to the associated factory's defaults.
    pub fn with_overrides(&self, overrides: AttrMap) -> Association {
        let mut assoc = self.clone();
        assoc.overrides = Some(overrides);
        assoc
    }

    /// Transient params forwarded to the associated factory's generator.
    pub fn with_transient(&self, params: Value) -> Association {
        let mut assoc = self.clone();
        assoc.transient = Some(params);
        assoc
    }

    /// Mark the association as `count` independent instances; resolution goes
    /// through `build_many`/`create_many`, and field narrowing maps over the
    /// resulting array.
    pub fn with_count(&self, count: usize) -> Association {
        let mut assoc = self.clone();
        assoc.count = Some(count);
        assoc
    }

    /// Resolve through the build path, memoized.
    pub async fn build(&self) -> Result<Value> {
        let model = self
            .built
            .get_or_try_init(|| self.resolve_fresh(ResolveMode::Build))
            .await?;
        self.narrow(model)
    }

    /// Resolve through the create path, memoized independently of `build`.
    pub async fn create(&self) -> Result<Value> {
        let model = self
            .created
            .get_or_try_init(|| self.resolve_fresh(ResolveMode::Create))
            .await?;
        self.narrow(model)
    }

    /// Dispatch to the build or create path.
    pub async fn resolve(&self, mode: ResolveMode) -> Result<Value> {
        match mode {
            ResolveMode::Build => self.build().await,
            ResolveMode::Create => self.create().await,
        }
    }

    /// The type-erased placeholder form embedded in attribute trees.
    pub fn handle(&self) -> AssociationHandle {
        AssociationHandle::new(Arc::new(self.clone()))
    }

    // Runs only when the per-mode cache is empty. A failure leaves the cache
    // unpopulated, so a later read retries.
    async fn resolve_fresh(&self, mode: ResolveMode) -> Result<Value> {
        match self.count {
            Some(count) => {
                let partials = self.overrides.clone().map(Partials::Shared);
                let items = match mode {
                    ResolveMode::Build => {
                        self.factory
                            .build_many(count, partials, self.transient.clone())
                            .await?
                    }
                    ResolveMode::Create => {
                        self.factory
                            .create_many(count, partials, self.transient.clone())
                            .await?
                    }
                };
                Ok(Value::Array(items))
            }
            None => match mode {
                ResolveMode::Build => {
                    self.factory
                        .build(self.overrides.clone(), self.transient.clone())
                        .await
                }
                ResolveMode::Create => {
                    self.factory
                        .create(self.overrides.clone(), self.transient.clone())
                        .await
                }
            },
        }
    }

    // The cache holds the unscoped resolution; field narrowing applies per
    // read so derivations can each pick their own field.
    fn narrow(&self, model: &Value) -> Result<Value> {
        let Some(key) = &self.key else {
            return Ok(model.clone());
        };
        let adapter = self.factory.adapter();
        match model {
            Value::Array(items) => items
                .iter()
                .map(|item| adapter.get(item, key))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => adapter.get(other, key),
        }
    }
}

#[async_trait]
impl ResolveAssociation for Association {
    async fn resolve(&self, mode: ResolveMode) -> Result<Value> {
        Association::resolve(self, mode).await
    }
}

impl From<Association> for AttrValue {
    fn from(association: Association) -> Self {
        AttrValue::Association(association.handle())
    }
}

impl From<&Association> for AttrValue {
    fn from(association: &Association) -> Self {
        AttrValue::Association(association.handle())
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("model", self.factory.model())
            .field("key", &self.key)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}
