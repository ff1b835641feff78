//! Identity-carrying host values: objects, functions and symbols.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{HostError, HostResult};
use crate::value::{Value, ValueKind};

/// Native call behaviour: `(this, args) -> result`.
pub type CallFn = dyn Fn(&Value, &[Value]) -> HostResult<Value>;

/// Native construct behaviour: `(args) -> new object`.
pub type ConstructFn = dyn Fn(&[Value]) -> HostResult<Value>;

// ══════════════════════════════════════════════════════════════════════════════
// Object
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct ObjectData {
    properties: BTreeMap<String, Value>,
    /// Backing store of a byte buffer object.
    bytes: Option<Vec<u8>>,
}

/// A mutable host object with string-keyed properties.
///
/// An object may also be a fixed-size byte buffer, in which case `length`
/// and canonical integer keys address the buffer instead of the property map.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zero-filled byte buffer of `len` bytes.
    pub fn with_bytes(len: usize) -> Self {
        Self::from_bytes(vec![0; len])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            properties: BTreeMap::new(),
            bytes: Some(bytes),
        })))
    }

    /// Read a property; missing properties are `undefined`.
    pub fn get(&self, key: &str) -> Value {
        let data = self.0.borrow();
        if let Some(bytes) = &data.bytes {
            if key == "length" {
                return Value::Number(bytes.len() as f64);
            }
            if let Some(index) = canonical_index(key) {
                return bytes
                    .get(index)
                    .map_or(Value::Undefined, |b| Value::Number(f64::from(*b)));
            }
        }
        data.properties.get(key).cloned().unwrap_or_default()
    }

    /// Write a property. Writes to a buffer's `length` or to an index past
    /// its end are refused.
    pub fn set(&self, key: &str, value: Value) -> bool {
        let mut data = self.0.borrow_mut();
        if let Some(bytes) = &mut data.bytes {
            if key == "length" {
                return false;
            }
            if let Some(index) = canonical_index(key) {
                let Some(slot) = bytes.get_mut(index) else {
                    return false;
                };
                *slot = to_uint8(value.to_number().unwrap_or(0.0));
                return true;
            }
        }
        data.properties.insert(key.to_string(), value);
        true
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.borrow().properties.contains_key(key)
    }

    /// Property keys in sorted order (buffer indices excluded).
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().properties.keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// A copy of the buffer contents, if this object is a byte buffer.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.0.borrow().bytes.clone()
    }

    pub fn is_buffer(&self) -> bool {
        self.0.borrow().bytes.is_some()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        match &data.bytes {
            Some(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
            None => f
                .debug_set()
                .entries(data.properties.keys())
                .finish(),
        }
    }
}

/// Parse a canonical array index: digits only, no leading zeros.
fn canonical_index(key: &str) -> Option<usize> {
    let index: usize = key.parse().ok()?;
    (index.to_string() == key).then_some(index)
}

/// Modular conversion to an unsigned byte.
fn to_uint8(n: f64) -> u8 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(256.0) as u8
}

// ══════════════════════════════════════════════════════════════════════════════
// Function
// ══════════════════════════════════════════════════════════════════════════════

struct FunctionData {
    name: String,
    call: Option<Box<CallFn>>,
    construct: Option<Box<ConstructFn>>,
    properties: RefCell<BTreeMap<String, Value>>,
}

/// A host function. Whether it can be called, constructed, or both is
/// decided when it is created.
#[derive(Clone)]
pub struct Function(Rc<FunctionData>);

impl Function {
    /// Create a function from optional call and construct behaviours.
    pub fn new(
        name: impl Into<String>,
        call: Option<Box<CallFn>>,
        construct: Option<Box<ConstructFn>>,
    ) -> Self {
        Self(Rc::new(FunctionData {
            name: name.into(),
            call,
            construct,
            properties: RefCell::new(BTreeMap::new()),
        }))
    }

    /// A plain callable function.
    pub fn native<F>(name: impl Into<String>, call: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> HostResult<Value> + 'static,
    {
        Self::new(name, Some(Box::new(call)), None)
    }

    /// A function that can only be used with `construct`.
    pub fn constructor<F>(name: impl Into<String>, construct: F) -> Self
    where
        F: Fn(&[Value]) -> HostResult<Value> + 'static,
    {
        Self::new(name, None, Some(Box::new(construct)))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_callable(&self) -> bool {
        self.0.call.is_some()
    }

    pub fn is_constructor(&self) -> bool {
        self.0.construct.is_some()
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> HostResult<Value> {
        match &self.0.call {
            Some(call) => call(this, args),
            None => Err(HostError::NotCallable(ValueKind::Function)),
        }
    }

    pub fn construct(&self, args: &[Value]) -> HostResult<Value> {
        match &self.0.construct {
            Some(construct) => construct(args),
            None => Err(HostError::NotConstructor(ValueKind::Function)),
        }
    }

    /// `name` is an own read-only property; everything else comes from the
    /// function's property map.
    pub fn get(&self, key: &str) -> Value {
        if key == "name" {
            return Value::string(self.0.name.as_str());
        }
        self.0
            .properties
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set(&self, key: &str, value: Value) -> bool {
        if key == "name" {
            return false;
        }
        self.0.properties.borrow_mut().insert(key.to_string(), value);
        true
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.0.name)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Symbol
// ══════════════════════════════════════════════════════════════════════════════

/// A unique symbol. Two symbols are equal only if they are the same symbol,
/// regardless of description.
#[derive(Clone)]
pub struct Symbol(Rc<Option<String>>);

impl Symbol {
    pub fn new(description: Option<String>) -> Self {
        Self(Rc::new(description))
    }

    pub fn description(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Explicit conversion, `Symbol(description)`.
    pub fn descriptive_string(&self) -> String {
        format!("Symbol({})", self.description().unwrap_or_default())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptive_string())
    }
}
