use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Opaque tag identifying the kind of model a factory produces.
///
/// The engine never looks inside it; adapters use it to route instances to
/// the right backing store (a table name, an entity class, a schema tag).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelDescriptor(String);

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelDescriptor {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ModelDescriptor {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Capability contract for pluggable persistence back-ends.
///
/// Instances are plain JSON values throughout; a concrete adapter decides how
/// they map onto its own representation. Failures propagate unchanged, the
/// engine attaches no context of its own.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Construct an in-memory instance from a merged attribute object.
    /// Must not perform I/O.
    fn build(&self, model: &ModelDescriptor, attributes: Value) -> Result<Value>;

    /// Persist an instance, returning it possibly mutated (e.g. with a
    /// generated id assigned).
    async fn save(&self, instance: Value, model: &ModelDescriptor) -> Result<Value>;

    /// Read a named field off an already built or saved instance.
    fn get(&self, instance: &Value, key: &str) -> Result<Value>;
}
