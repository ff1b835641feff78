//! The realm: the global object and the builtins reachable from it.

use crate::builtins;
use crate::object::Object;
use crate::value::Value;

/// A host realm. Each bridge owns one, so guest instances never observe each
/// other's globals.
#[derive(Debug, Clone)]
pub struct Realm {
    global: Object,
}

impl Realm {
    /// Create a realm whose global object carries the builtin constructors.
    pub fn new() -> Self {
        let global = Object::new();
        builtins::install(&global);
        Self { global }
    }

    /// The global object.
    pub fn global(&self) -> &Object {
        &self.global
    }

    /// The global object as a value.
    pub fn global_value(&self) -> Value {
        Value::Object(self.global.clone())
    }

    /// Bind `name` on the global object.
    pub fn define_global(&self, name: &str, value: impl Into<Value>) {
        self.global.set(name, value.into());
    }

    /// Look up a global binding; unbound names are `undefined`.
    pub fn lookup_global(&self, name: &str) -> Value {
        self.global.get(name)
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}
