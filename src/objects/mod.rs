//! The object model.
//!
//! Objects are shared, lock-guarded values with optional capabilities.
//! [`object`] holds the base trait and the [`ObjectRef`](object::ObjectRef)
//! handle; the remaining modules are the concrete types the engine creates.

pub mod connection;
pub mod object;
pub mod set;

pub use object::{Object, ObjectRef};
