//! Declarative test-fixture factories for Rust.
//!
//! A factory pairs a model descriptor with a default-attributes generator and
//! a pluggable persistence adapter. `build` produces in-memory object graphs,
//! `create` persists them; both support deep-merged overrides, lazily
//! resolved cross-factory associations, named sequences, and after-build /
//! after-create hook pipelines.
//!
//! ```no_run
//! use fabrica::{attrs, registry, sequence};
//!
//! # async fn demo() -> fabrica::Result<()> {
//! let address_factory = registry::define("Address", |_ctx| {
//!     attrs! { "street": "Main Street", "number": 123, "city": "New York" }
//! });
//! let user_factory = registry::define("User", move |_ctx| {
//!     attrs! {
//!         "name": "John Doe",
//!         "email": sequence("user.email", |n| format!("test-{n}@mail.com")),
//!         "address": address_factory.associate(),
//!     }
//! });
//!
//! let user = user_factory.build(None, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod association;
pub mod factory;
pub mod registry;
pub mod sequence;

pub use association::Association;
pub use factory::{
    AttributesContext, AttributesGenerator, Factory, Partials, async_generator, sync_generator,
};
pub use sequence::sequence;

pub use fabrica_core::{
    AssociationHandle, AttrMap, AttrValue, Error, ModelAdapter, ModelDescriptor, ResolveMode,
    Result, attrs, merge_deep,
};
