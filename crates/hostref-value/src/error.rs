//! Host-level fault types.

use thiserror::Error;

use crate::value::ValueKind;

/// A fault raised by the host object model.
///
/// These mirror the type and range errors a dynamically typed host throws
/// when a reflective operation is applied to a value that lacks the
/// capability. They carry only owned, thread-safe data so they can be
/// forwarded across the wasm engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Reflective property access on a primitive.
    #[error("reflective {operation} called on non-object ({kind})")]
    NotAnObject {
        operation: &'static str,
        kind: ValueKind,
    },

    /// `call` on a value without a call behaviour.
    #[error("value of type {0} is not callable")]
    NotCallable(ValueKind),

    /// `construct` on a value without a construct behaviour.
    #[error("value of type {0} is not a constructor")]
    NotConstructor(ValueKind),

    /// A constructor that refuses to be called without `new`.
    #[error("constructor {0} requires 'new'")]
    RequiresNew(String),

    /// Symbols have no implicit string conversion.
    #[error("cannot convert a symbol to a string")]
    SymbolToString,

    /// Generic type error raised by a native function.
    #[error("type error: {0}")]
    TypeError(String),

    /// Numeric argument out of the accepted range.
    #[error("range error: {0}")]
    RangeError(String),
}

/// Result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;
