use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use fabrica_core::{Error, ModelAdapter, ModelDescriptor, Result};

/// In-memory adapter: instances are plain JSON objects, saved rows are kept
/// per model name. `save` assigns a monotonically increasing integer `id`
/// when the instance has none, so created records are distinguishable from
/// built ones.
#[derive(Debug, Default)]
pub struct ObjectAdapter {
    rows: Mutex<BTreeMap<String, Vec<Value>>>,
    next_id: AtomicU64,
}

impl ObjectAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows saved for a model, in save order.
    pub fn rows(&self, model: &ModelDescriptor) -> Vec<Value> {
        self.rows
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .get(model.name())
            .cloned()
            .unwrap_or_default()
    }

    /// Drop all saved rows. The id counter keeps counting.
    pub fn clear(&self) {
        self.rows
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
    }
}

#[async_trait]
impl ModelAdapter for ObjectAdapter {
    fn build(&self, model: &ModelDescriptor, attributes: Value) -> Result<Value> {
        if attributes.is_object() {
            Ok(attributes)
        } else {
            Err(Error::Adapter(format!(
                "expected object attributes for '{model}', got {attributes}"
            )))
        }
    }

    async fn save(&self, mut instance: Value, model: &ModelDescriptor) -> Result<Value> {
        if let Value::Object(fields) = &mut instance
            && !fields.contains_key("id")
        {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            fields.insert("id".to_string(), Value::from(id));
        }
        debug!(model = %model, "saving fixture row");
        self.rows
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .entry(model.name().to_string())
            .or_default()
            .push(instance.clone());
        Ok(instance)
    }

    fn get(&self, instance: &Value, key: &str) -> Result<Value> {
        instance
            .get(key)
            .cloned()
            .ok_or_else(|| Error::MissingField(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_assigns_ids_and_records_rows() {
        let adapter = ObjectAdapter::new();
        let model = ModelDescriptor::new("User");

        let built = adapter
            .build(&model, json!({"name": "John Doe"}))
            .expect("object passes through");
        let first = adapter.save(built, &model).await.expect("saved");
        let second = adapter
            .save(json!({"name": "Jane Doe"}), &model)
            .await
            .expect("saved");

        assert_eq!(first.get("id"), Some(&json!(1)));
        assert_eq!(second.get("id"), Some(&json!(2)));
        assert_eq!(adapter.rows(&model).len(), 2);
    }

    #[tokio::test]
    async fn save_keeps_an_existing_id() {
        let adapter = ObjectAdapter::new();
        let model = ModelDescriptor::new("User");

        let saved = adapter
            .save(json!({"id": 42, "name": "John Doe"}), &model)
            .await
            .expect("saved");
        assert_eq!(saved.get("id"), Some(&json!(42)));
    }

    #[test]
    fn build_rejects_non_objects() {
        let adapter = ObjectAdapter::new();
        let model = ModelDescriptor::new("User");
        let err = adapter.build(&model, json!([1, 2])).expect_err("not an object");
        assert!(matches!(err, Error::Adapter(_)));
    }

    #[test]
    fn get_reports_missing_fields() {
        let adapter = ObjectAdapter::new();
        let err = adapter
            .get(&json!({"name": "John Doe"}), "email")
            .expect_err("no email field");
        assert!(matches!(err, Error::MissingField(key) if key == "email"));
    }
}
