use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Value, json};

use fabrica::adapters::ObjectAdapter;
use fabrica::{
    AttrMap, Error, ModelAdapter, ModelDescriptor, Partials, Result, attrs, registry,
};

fn user_defaults() -> AttrMap {
    attrs! {
        "name": "John Doe",
        "email": "test@mail.com",
        "address": attrs! { "street": "Main Street", "number": 123, "city": "New York" },
    }
}

#[tokio::test]
async fn create_persists_and_assigns_an_id() {
    let adapter = Arc::new(ObjectAdapter::new());
    let user_factory = registry::define_with_adapter("User", |_ctx| user_defaults(), adapter.clone());

    let user = user_factory.create(None, None).await.expect("created");

    assert_eq!(user.get("id"), Some(&json!(1)));
    assert_eq!(user.get("name"), Some(&json!("John Doe")));
    let rows = adapter.rows(&ModelDescriptor::new("User"));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], user);
}

#[tokio::test]
async fn create_resolves_an_association_to_a_single_field() {
    let adapter = Arc::new(ObjectAdapter::new());
    let user_factory =
        registry::define_with_adapter("User", |_ctx| user_defaults(), adapter.clone());
    let address_factory = registry::define_with_adapter(
        "Address",
        move |_ctx| {
            attrs! {
                "street": "Main Street",
                "city": "New York",
                "user_id": user_factory.associate().get("id"),
            }
        },
        adapter.clone(),
    );

    let address = address_factory.create(None, None).await.expect("created");

    let users = adapter.rows(&ModelDescriptor::new("User"));
    assert_eq!(users.len(), 1);
    assert_eq!(address.get("user_id"), users[0].get("id"));
}

#[tokio::test]
async fn create_many_yields_independent_rows() {
    let adapter = Arc::new(ObjectAdapter::new());
    let user_factory =
        registry::define_with_adapter("User", |_ctx| user_defaults(), adapter.clone());

    let users = user_factory
        .create_many(3, Some(Partials::Shared(attrs! { "name": "same-name" })), None)
        .await
        .expect("created");

    let ids: Vec<&Value> = users.iter().filter_map(|user| user.get("id")).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.windows(2).all(|pair| pair[0] != pair[1]));
    for user in &users {
        assert_eq!(user.get("name"), Some(&json!("same-name")));
    }
    assert_eq!(adapter.rows(&ModelDescriptor::new("User")).len(), 3);
}

#[tokio::test]
async fn after_create_hooks_run_in_registration_order() {
    let adapter = Arc::new(ObjectAdapter::new());
    let user_factory =
        registry::define_with_adapter("User", |_ctx| attrs! { "name": "John Doe" }, adapter)
            .after_create(|mut user| {
                user["name"] = json!(format!("{}-a", user["name"].as_str().unwrap_or_default()));
                Ok(user)
            })
            .after_create(|mut user| {
                user["name"] = json!(format!("{}-b", user["name"].as_str().unwrap_or_default()));
                Ok(user)
            });

    let user = user_factory.create(None, None).await.expect("created");

    assert_eq!(user.get("name"), Some(&json!("John Doe-a-b")));
}

#[tokio::test]
async fn an_async_after_create_hook_can_resave() {
    let adapter = Arc::new(ObjectAdapter::new());
    let user_factory =
        registry::define_with_adapter("User", |_ctx| attrs! { "name": "John Doe" }, adapter.clone())
            .after_create_async(|mut user, adapter| {
                async move {
                    user["name"] = json!("Renamed");
                    adapter.save(user, &ModelDescriptor::new("User")).await
                }
                .boxed()
            });

    let user = user_factory.create(None, None).await.expect("created");

    assert_eq!(user.get("name"), Some(&json!("Renamed")));
    let rows = adapter.rows(&ModelDescriptor::new("User"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("name"), Some(&json!("Renamed")));
    // the re-save keeps the id assigned on the first save
    assert_eq!(rows[1].get("id"), rows[0].get("id"));
}

#[tokio::test]
async fn mutate_morphs_the_created_output() {
    let adapter = Arc::new(ObjectAdapter::new());
    let user_factory =
        registry::define_with_adapter("User", |_ctx| attrs! { "name": "John Doe" }, adapter)
            .mutate(|user| Ok(json!({"kind": "employee", "record": user})));

    let employee = user_factory.create(None, None).await.expect("created");

    assert_eq!(employee.get("kind"), Some(&json!("employee")));
    assert_eq!(
        employee.pointer("/record/name"),
        Some(&json!("John Doe"))
    );
}

#[tokio::test]
async fn a_generator_failure_propagates() {
    let user_factory = registry::define_async("User", |_ctx| async {
        Err(Error::Attributes("missing seed data".to_string()))
    });

    let err = user_factory.create(None, None).await.expect_err("generator failed");

    assert!(matches!(err, Error::Attributes(_)));
}

struct RefusingAdapter;

#[async_trait]
impl ModelAdapter for RefusingAdapter {
    fn build(&self, _model: &ModelDescriptor, attributes: Value) -> Result<Value> {
        Ok(attributes)
    }

    async fn save(&self, _instance: Value, model: &ModelDescriptor) -> Result<Value> {
        Err(Error::Adapter(format!("store for '{model}' is read-only")))
    }

    fn get(&self, instance: &Value, key: &str) -> Result<Value> {
        instance
            .get(key)
            .cloned()
            .ok_or_else(|| Error::MissingField(key.to_string()))
    }
}

#[tokio::test]
async fn an_adapter_failure_propagates() {
    let user_factory = registry::define_with_adapter(
        "User",
        |_ctx| attrs! { "name": "John Doe" },
        Arc::new(RefusingAdapter),
    );

    // build has no save step, so only create fails
    user_factory.build(None, None).await.expect("built");
    let err = user_factory.create(None, None).await.expect_err("save refused");

    assert!(matches!(err, Error::Adapter(_)));
}
