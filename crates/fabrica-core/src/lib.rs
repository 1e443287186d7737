//! Core contracts for Fabrica fixture factories.
//!
//! This crate defines the attribute-tree value model, the deep-merge rules,
//! the adapter capability contract, and the error type shared by the engine
//! and by concrete adapters.

pub mod adapter;
pub mod error;
pub mod merge;
pub mod value;

pub use adapter::{ModelAdapter, ModelDescriptor};
pub use error::{Error, Result};
pub use merge::merge_deep;
pub use value::{
    AssociationHandle, AttrMap, AttrValue, ResolveAssociation, ResolveMode, map_from_value,
    map_into_value,
};
