//! Builtin constructors installed on every realm's global object.

use crate::error::{HostError, HostResult};
use crate::object::{Function, Object, Symbol};
use crate::value::Value;

/// Install the builtins onto `global`.
pub(crate) fn install(global: &Object) {
    global.set("Object", Value::Function(object_ctor()));
    global.set("Uint8Array", Value::Function(uint8_array_ctor()));
    global.set("Symbol", Value::Function(symbol_fn()));
    global.set("String", Value::Function(string_fn()));
}

/// `Object(value?)`: returns an object argument unchanged, otherwise a fresh
/// empty object. Callable and constructible.
fn object_ctor() -> Function {
    fn make(args: &[Value]) -> Value {
        match args.first() {
            Some(v @ (Value::Object(_) | Value::Function(_))) => v.clone(),
            _ => Value::Object(Object::new()),
        }
    }
    Function::new(
        "Object",
        Some(Box::new(|_this: &Value, args: &[Value]| -> HostResult<Value> {
            Ok(make(args))
        })),
        Some(Box::new(|args: &[Value]| -> HostResult<Value> { Ok(make(args)) })),
    )
}

/// `new Uint8Array(length | buffer)`: a fixed-size zeroed byte buffer, or a
/// copy of another buffer. Calling without `new` is a fault.
fn uint8_array_ctor() -> Function {
    Function::new(
        "Uint8Array",
        Some(Box::new(|_this: &Value, _args: &[Value]| -> HostResult<Value> {
            Err(HostError::RequiresNew("Uint8Array".to_string()))
        })),
        Some(Box::new(|args: &[Value]| -> HostResult<Value> {
            let buffer = match args.first() {
                None | Some(Value::Undefined) => Object::with_bytes(0),
                Some(Value::Object(src)) if src.is_buffer() => {
                    Object::from_bytes(src.bytes().unwrap_or_default())
                }
                Some(other) => Object::with_bytes(byte_length(other)?),
            };
            Ok(Value::Object(buffer))
        })),
    )
}

fn byte_length(arg: &Value) -> HostResult<usize> {
    let n = arg.to_number()?;
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if !(0.0..=f64::from(u32::MAX)).contains(&n) {
        return Err(HostError::RangeError(format!("invalid typed array length: {n}")));
    }
    Ok(n as usize)
}

/// `Symbol(description?)`: a fresh unique symbol. Not a constructor.
fn symbol_fn() -> Function {
    Function::native("Symbol", |_this, args| {
        let description = match args.first() {
            None | Some(Value::Undefined) => None,
            Some(v) => Some(v.to_host_string()?),
        };
        Ok(Value::Symbol(Symbol::new(description)))
    })
}

/// `String(value?)`: string conversion, accepting symbols explicitly.
fn string_fn() -> Function {
    Function::native("String", |_this, args| {
        let s = match args.first() {
            None => String::new(),
            Some(Value::Symbol(sym)) => sym.descriptive_string(),
            Some(v) => v.to_host_string()?,
        };
        Ok(Value::string(s))
    })
}
