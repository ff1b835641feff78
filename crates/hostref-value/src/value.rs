//! The tagged host value and its reflective capabilities.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::object::{Function, Object, Symbol};

/// The host-level type of a value, as reported by `typeof`.
///
/// `null` reports as [`ValueKind::Object`], matching the host convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Undefined,
    Object,
    Boolean,
    Number,
    String,
    Symbol,
    Function,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Object => "object",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Function => "function",
        };
        f.write_str(name)
    }
}

/// A host value.
///
/// Primitives are stored inline; strings are shared `Rc<str>`; objects,
/// functions and symbols are handles whose identity is preserved across
/// clones.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Symbol),
    Object(Object),
    Function(Function),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into())
    }

    /// The `typeof` classification of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Undefined => ValueKind::Undefined,
            Self::Null | Self::Object(_) => ValueKind::Object,
            Self::Bool(_) => ValueKind::Boolean,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Symbol(_) => ValueKind::Symbol,
            Self::Function(_) => ValueKind::Function,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `true` only for a number whose value is NaN.
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Number(n) if n.is_nan())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    // ── Reflective operations ────────────────────────────────────────────

    /// Read a property. Only objects and functions are valid targets.
    pub fn get(&self, key: &str) -> HostResult<Value> {
        match self {
            Self::Object(o) => Ok(o.get(key)),
            Self::Function(f) => Ok(f.get(key)),
            other => Err(HostError::NotAnObject {
                operation: "get",
                kind: other.kind(),
            }),
        }
    }

    /// Write a property. Returns whether the write took effect.
    pub fn set(&self, key: &str, value: Value) -> HostResult<bool> {
        match self {
            Self::Object(o) => Ok(o.set(key, value)),
            Self::Function(f) => Ok(f.set(key, value)),
            other => Err(HostError::NotAnObject {
                operation: "set",
                kind: other.kind(),
            }),
        }
    }

    /// Invoke this value as a function with the given receiver.
    pub fn call(&self, this: &Value, args: &[Value]) -> HostResult<Value> {
        match self {
            Self::Function(f) => f.call(this, args),
            other => Err(HostError::NotCallable(other.kind())),
        }
    }

    /// Invoke this value as a constructor.
    pub fn construct(&self, args: &[Value]) -> HostResult<Value> {
        match self {
            Self::Function(f) => f.construct(args),
            other => Err(HostError::NotConstructor(other.kind())),
        }
    }

    // ── Conversions ──────────────────────────────────────────────────────

    /// Host string coercion, as applied by the text encoder.
    pub fn to_host_string(&self) -> HostResult<String> {
        Ok(match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.to_string(),
            Self::Symbol(_) => return Err(HostError::SymbolToString),
            Self::Object(_) => "[object Object]".to_string(),
            Self::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
        })
    }

    /// Host number coercion (`+value`).
    pub fn to_number(&self) -> HostResult<f64> {
        Ok(match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Symbol(_) => {
                return Err(HostError::TypeError(
                    "cannot convert a symbol to a number".to_string(),
                ))
            }
            Self::Object(_) | Self::Function(_) => f64::NAN,
        })
    }

    /// Build a host value from JSON. Objects and arrays become fresh host
    /// objects (arrays are keyed by index and carry a `length`).
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::string(s.as_str()),
            serde_json::Value::Array(items) => {
                let obj = Object::new();
                for (i, item) in items.iter().enumerate() {
                    obj.set(&i.to_string(), Self::from_json(item));
                }
                obj.set("length", Self::Number(items.len() as f64));
                Self::Object(obj)
            }
            serde_json::Value::Object(map) => {
                let obj = Object::new();
                for (k, v) in map {
                    obj.set(k, Self::from_json(v));
                }
                Self::Object(obj)
            }
        }
    }

    /// Serialize to JSON the way the host's stringifier would: non-finite
    /// numbers, `undefined`, functions and symbols become `null`, byte
    /// buffers become arrays. Cyclic objects are a type error.
    pub fn to_json(&self) -> HostResult<serde_json::Value> {
        let mut visiting = Vec::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut Vec<*const ()>) -> HostResult<serde_json::Value> {
        Ok(match self {
            Self::Undefined | Self::Null | Self::Symbol(_) | Self::Function(_) => {
                serde_json::Value::Null
            }
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Object(o) => {
                if let Some(bytes) = o.bytes() {
                    return Ok(serde_json::Value::Array(
                        bytes.into_iter().map(serde_json::Value::from).collect(),
                    ));
                }
                let ptr = o.as_ptr();
                if visiting.contains(&ptr) {
                    return Err(HostError::TypeError("cyclic object value".to_string()));
                }
                visiting.push(ptr);
                let mut map = serde_json::Map::new();
                for (key, value) in o.entries() {
                    map.insert(key, value.to_json_inner(visiting)?);
                }
                visiting.pop();
                serde_json::Value::Object(map)
            }
        })
    }
}

/// Shortest round-trip digits laid out as the host prints numbers: plain
/// decimal for magnitudes in `[1e-6, 1e21)`, exponent form otherwise.
fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let sign = if n < 0.0 { "-" } else { "" };
    if n.is_infinite() {
        return format!("{sign}Infinity");
    }

    // `{:e}` yields the shortest round-trip digits, e.g. `1.2345e3`.
    let sci = format!("{:e}", n.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // Position of the decimal point relative to the first digit.
    let point = exp.parse::<i32>().unwrap_or(0) + 1;

    let body = if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
    } else {
        let e = point - 1;
        let e_sign = if e < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{e_sign}{}", e.unsigned_abs())
        } else {
            format!("{first}.{rest}e{e_sign}{}", e.unsigned_abs())
        }
    };
    format!("{sign}{body}")
}

/// Strict equality: numbers by IEEE value, strings by content, everything
/// with identity by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Symbol(s) => write!(f, "{s:?}"),
            Self::Object(o) => write!(f, "{o:?}"),
            Self::Function(func) => write!(f, "{func:?}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Self::Symbol(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_typeof_object() {
        assert_eq!(Value::Null.kind(), ValueKind::Object);
        assert_eq!(Value::Undefined.kind().to_string(), "undefined");
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let nan = Value::Number(f64::NAN);
        assert!(nan.is_nan());
        assert_ne!(nan, nan.clone());
    }

    #[test]
    fn number_formatting() {
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
        assert_eq!(number_to_string(123.456), "123.456");
        assert_eq!(number_to_string(-0.25), "-0.25");
        assert_eq!(number_to_string(0.000001), "0.000001");
    }

    #[test]
    fn number_formatting_switches_to_exponent() {
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.5e300), "1.5e+300");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(-2.5e-8), "-2.5e-8");
        assert_eq!(number_to_string(f64::MIN_POSITIVE), "2.2250738585072014e-308");
    }

    #[test]
    fn accessors_match_variant() {
        let obj = Object::new();
        let func = Function::native("id", |this, _| Ok(this.clone()));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Number(1.0).as_bool(), None);
        assert!(Value::Object(obj.clone()).as_object().unwrap().ptr_eq(&obj));
        assert!(Value::from("x").as_object().is_none());
        assert!(Value::Function(func.clone()).as_function().unwrap().ptr_eq(&func));
        assert!(Value::Null.as_function().is_none());
    }

    #[test]
    fn primitive_property_access_faults() {
        let err = Value::from("hello").get("length").unwrap_err();
        assert_eq!(
            err,
            HostError::NotAnObject {
                operation: "get",
                kind: ValueKind::String
            }
        );
        assert!(Value::Undefined.set("x", Value::Null).is_err());
    }

    #[test]
    fn string_to_number() {
        assert_eq!(Value::from(" 12 ").to_number().unwrap(), 12.0);
        assert_eq!(Value::from("").to_number().unwrap(), 0.0);
        assert!(Value::from("abc").to_number().unwrap().is_nan());
    }
}
