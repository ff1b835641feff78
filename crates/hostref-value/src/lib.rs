//! Dynamically typed host value model.
//!
//! This crate is the "host" side of the reference bridge: an object model in
//! which every value is one of a small set of variants and in which objects
//! and functions expose the reflective capabilities a guest may ask for
//! (`get`, `set`, `call`, `construct`).
//!
//! A capability that a value does not support is reported as a
//! [`HostError`] rather than silently ignored; the bridge turns such errors
//! into traps that abort the current guest call.
//!
//! Values are reference counted (`Rc`) and are therefore bound to the thread
//! that created them, the same as a single guest instance.

mod builtins;
mod error;
mod object;
mod realm;
mod value;

pub use error::{HostError, HostResult};
pub use object::{CallFn, ConstructFn, Function, Object, Symbol};
pub use realm::Realm;
pub use value::{Value, ValueKind};
