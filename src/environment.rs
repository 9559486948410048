use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// Lexical block scope used while executing script code.
///
/// Chains end at a function's defining block; names not found here are
/// resolved against the root scope by the interpreter.
#[derive(Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    pub fn define(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Rebinds an existing name; returns false when the chain lacks it.
    pub fn assign(env: &EnvironmentRef, name: &str, value: Value) -> bool {
        let parent = {
            let mut current = env.borrow_mut();
            if let Some(slot) = current.bindings.get_mut(name) {
                *slot = value;
                return true;
            }
            current.parent.clone()
        };
        match parent {
            Some(parent) => Environment::assign(&parent, name, value),
            None => false,
        }
    }

    pub fn get(env: &EnvironmentRef, name: &str) -> Option<Value> {
        let parent = {
            let current = env.borrow();
            if let Some(value) = current.bindings.get(name) {
                return Some(value.clone());
            }
            current.parent.clone()
        };
        parent.and_then(|parent| Environment::get(&parent, name))
    }
}
