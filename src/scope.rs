use crate::value::{ObjectMap, Value};

/// Object-backed name-resolution scope.
///
/// A scope's bindings live in an object value so scripts can reach the
/// global scope as data (`global.name`). Children borrow their parent, which
/// makes a child's lifetime end before the parent's.
pub struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    object: Value,
}

impl Scope<'static> {
    pub fn global() -> Self {
        Self {
            parent: None,
            object: Value::object(ObjectMap::new()),
        }
    }
}

impl<'p> Scope<'p> {
    pub fn child(parent: &'p Scope<'p>) -> Self {
        Self {
            parent: Some(parent),
            object: Value::object(ObjectMap::new()),
        }
    }

    pub fn parent(&self) -> Option<&'p Scope<'p>> {
        self.parent
    }

    /// The object holding this scope's own bindings.
    pub fn object(&self) -> Value {
        self.object.clone()
    }

    /// Binds `name` in this scope, replacing any existing binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        if let Some(mut bindings) = self.object.as_object_mut() {
            bindings.insert(name.into(), value);
        }
    }

    pub fn contains_own(&self, name: &str) -> bool {
        self.object
            .as_object()
            .is_some_and(|bindings| bindings.contains_key(name))
    }

    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.object
            .as_object()
            .and_then(|bindings| bindings.get(name).cloned())
    }

    /// Resolves `name` here first, then along the parent chain.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.get_own(name) {
                return Some(value);
            }
            scope = current.parent;
        }
        None
    }

    /// Rebinds `name` in the nearest scope that already defines it.
    ///
    /// Returns false when no scope in the chain knows the name.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if current.contains_own(name) {
                current.define(name, value);
                return true;
            }
            scope = current.parent;
        }
        false
    }

    pub fn own_keys(&self) -> Vec<String> {
        self.object
            .as_object()
            .map(|bindings| bindings.keys().cloned().collect())
            .unwrap_or_default()
    }
}
