use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Attribute tree: field name to value, insertion order preserved so merge
/// and sequence evaluation stay deterministic.
pub type AttrMap = IndexMap<String, AttrValue>;

/// Whether an association resolves through the build path or the create path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Build,
    Create,
}

/// Capability implemented by deferred references embedded in attribute trees.
///
/// The engine crate provides the concrete association type; this seam lets
/// the merge and conversion code carry placeholders opaquely.
#[async_trait]
pub trait ResolveAssociation: Send + Sync {
    /// Resolve to a concrete value through the given path.
    async fn resolve(&self, mode: ResolveMode) -> Result<Value>;
}

/// Opaque handle to a deferred association inside an attribute tree.
#[derive(Clone)]
pub struct AssociationHandle(Arc<dyn ResolveAssociation>);

impl AssociationHandle {
    pub fn new(resolver: Arc<dyn ResolveAssociation>) -> Self {
        Self(resolver)
    }

    pub async fn resolve(&self, mode: ResolveMode) -> Result<Value> {
        self.0.resolve(mode).await
    }
}

impl fmt::Debug for AssociationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AssociationHandle(..)")
    }
}

impl PartialEq for AssociationHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A single value in an attribute tree.
///
/// The `Association` variant is the one tagged placeholder kind the merge and
/// resolution algorithms special-case; plain objects can never be mistaken
/// for it.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<AttrValue>),
    Object(AttrMap),
    Association(AssociationHandle),
}

impl AttrValue {
    pub fn is_association(&self) -> bool {
        matches!(self, AttrValue::Association(_))
    }

    /// Convert a plain JSON value into an attribute value.
    pub fn from_value(value: Value) -> AttrValue {
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(value) => AttrValue::Bool(value),
            Value::Number(value) => AttrValue::Number(value),
            Value::String(value) => AttrValue::String(value),
            Value::Array(items) => {
                AttrValue::Array(items.into_iter().map(AttrValue::from_value).collect())
            }
            Value::Object(fields) => {
                let mut map = AttrMap::new();
                for (key, value) in fields {
                    map.insert(key, AttrValue::from_value(value));
                }
                AttrValue::Object(map)
            }
        }
    }

    /// Convert a fully resolved attribute value into a plain JSON value.
    ///
    /// Fails if an association placeholder is still present anywhere in the
    /// tree, reporting the path it was found at.
    pub fn into_value(self) -> Result<Value> {
        into_value_at(self, "")
    }
}

fn into_value_at(value: AttrValue, path: &str) -> Result<Value> {
    match value {
        AttrValue::Null => Ok(Value::Null),
        AttrValue::Bool(value) => Ok(Value::Bool(value)),
        AttrValue::Number(value) => Ok(Value::Number(value)),
        AttrValue::String(value) => Ok(Value::String(value)),
        AttrValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                out.push(into_value_at(item, &child_path(path, &index.to_string()))?);
            }
            Ok(Value::Array(out))
        }
        AttrValue::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let converted = into_value_at(value, &child_path(path, &key))?;
                out.insert(key, converted);
            }
            Ok(Value::Object(out))
        }
        AttrValue::Association(_) => Err(Error::UnresolvedAssociation(path.to_string())),
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Convert a fully resolved attribute tree into a plain JSON object.
pub fn map_into_value(map: AttrMap) -> Result<Value> {
    AttrValue::Object(map).into_value()
}

/// Convert a JSON object into an attribute tree.
pub fn map_from_value(value: Value) -> Result<AttrMap> {
    match AttrValue::from_value(value) {
        AttrValue::Object(map) => Ok(map),
        other => Err(Error::Other(format!(
            "expected a JSON object for an attribute tree, got {other:?}"
        ))),
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        AttrValue::from_value(value)
    }
}

impl From<AssociationHandle> for AttrValue {
    fn from(handle: AssociationHandle) -> Self {
        AttrValue::Association(handle)
    }
}

impl From<AttrMap> for AttrValue {
    fn from(map: AttrMap) -> Self {
        AttrValue::Object(map)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Number(Number::from(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Number(Number::from(value))
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::Number(Number::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(AttrValue::Number)
            .unwrap_or(AttrValue::Null)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        AttrValue::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Build an [`AttrMap`] from `"key": value` pairs, `serde_json::json!` style.
///
/// Values can be scalars, nested `attrs!` maps, vectors, JSON values, or
/// associations, anything `Into<AttrValue>`.
#[macro_export]
macro_rules! attrs {
    () => { $crate::AttrMap::new() };
    ($($key:literal : $value:expr),+ $(,)?) => {{
        let mut map = $crate::AttrMap::new();
        $(
            map.insert($key.to_string(), $crate::AttrValue::from($value));
        )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StubResolver;

    #[async_trait]
    impl ResolveAssociation for StubResolver {
        async fn resolve(&self, _mode: ResolveMode) -> Result<Value> {
            Ok(json!({"id": 1}))
        }
    }

    fn stub_handle() -> AssociationHandle {
        AssociationHandle::new(Arc::new(StubResolver))
    }

    #[test]
    fn attrs_macro_preserves_insertion_order() {
        let map = attrs! {
            "name": "John Doe",
            "age": 20,
            "active": true,
        };
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "age", "active"]);
    }

    #[test]
    fn roundtrips_plain_json() {
        let original = json!({
            "name": "John Doe",
            "address": {"street": "Main Street", "number": 123},
            "tags": ["a", "b"],
            "cleared": null,
        });
        let map = map_from_value(original.clone()).expect("object tree");
        assert_eq!(map_into_value(map).expect("resolved tree"), original);
    }

    #[test]
    fn null_is_distinguishable_from_absent() {
        let map = attrs! { "name": AttrValue::Null };
        let value = map_into_value(map).expect("resolved tree");
        assert_eq!(value.get("name"), Some(&Value::Null));
        assert_eq!(value.get("email"), None);
    }

    #[test]
    fn unresolved_association_reports_its_path() {
        let map = attrs! {
            "name": "John Doe",
            "address": attrs! { "owner": AttrValue::Association(stub_handle()) },
        };
        let err = map_into_value(map).expect_err("placeholder left in tree");
        assert!(matches!(
            err,
            Error::UnresolvedAssociation(path) if path == "address.owner"
        ));
    }

    #[test]
    fn handles_compare_by_identity() {
        let handle = stub_handle();
        assert_eq!(
            AttrValue::Association(handle.clone()),
            AttrValue::Association(handle)
        );
        assert_ne!(
            AttrValue::Association(stub_handle()),
            AttrValue::Association(stub_handle())
        );
    }
}
