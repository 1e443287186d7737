//! Built-in persistence adapters.
//!
//! Only the in-memory [`ObjectAdapter`] ships here; real database adapters
//! implement [`fabrica_core::ModelAdapter`] in their own crates.

mod object;

pub use object::ObjectAdapter;
