use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::{
    ast::Stmt,
    diagnostics::{Diagnostic, SourceSpan},
    environment::EnvironmentRef,
    runtime::Interpreter,
};

pub type ObjectMap = IndexMap<String, Value>;

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn double(value: f64) -> Self {
        Self::new(ValueKind::Double(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(RefCell::new(values)))
    }

    pub fn object(entries: ObjectMap) -> Self {
        Self::new(ValueKind::Object(RefCell::new(entries)))
    }

    pub fn is_null(&self) -> bool {
        matches!(&*self.0, ValueKind::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Ref<'_, ObjectMap>> {
        match &*self.0 {
            ValueKind::Object(map) => Some(map.borrow()),
            _ => None,
        }
    }

    pub fn as_object_mut(&self) -> Option<RefMut<'_, ObjectMap>> {
        match &*self.0 {
            ValueKind::Object(map) => Some(map.borrow_mut()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<Ref<'_, Vec<Value>>> {
        match &*self.0 {
            ValueKind::Array(values) => Some(values.borrow()),
            _ => None,
        }
    }

    pub fn as_array_mut(&self) -> Option<RefMut<'_, Vec<Value>>> {
        match &*self.0 {
            ValueKind::Array(values) => Some(values.borrow_mut()),
            _ => None,
        }
    }

    /// True when both values are the same shared array/object/function.
    pub fn same_identity(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Int(n) => *n != 0,
            ValueKind::Double(f) => *f != 0.0 && !f.is_nan(),
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Array(_)
            | ValueKind::Object(_)
            | ValueKind::Function(_)
            | ValueKind::NativeFunction(_) => true,
        }
    }

    /// Name reported by the `type()` builtin.
    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Null => "null",
            ValueKind::Bool(_) => "bool",
            ValueKind::Int(_) => "int",
            ValueKind::Double(_) => "double",
            ValueKind::String(_) => "string",
            ValueKind::Array(_) => "array",
            ValueKind::Object(_) => "object",
            ValueKind::Function(_) | ValueKind::NativeFunction(_) => "function",
        }
    }

    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::null(),
            JsonValue::Bool(b) => Value::bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(int) => Value::int(int),
                None => Value::double(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::string(s),
            JsonValue::Array(items) => {
                Value::array(items.into_iter().map(Value::from_json).collect())
            }
            JsonValue::Object(map) => Value::object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// JSON rendering; functions become their `Display` text and
    /// non-finite doubles become `null`.
    pub fn to_json(&self) -> JsonValue {
        match &*self.0 {
            ValueKind::Null => JsonValue::Null,
            ValueKind::Bool(b) => JsonValue::Bool(*b),
            ValueKind::Int(n) => JsonValue::from(*n),
            ValueKind::Double(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ValueKind::String(s) => JsonValue::String(s.clone()),
            ValueKind::Array(values) => {
                JsonValue::Array(values.borrow().iter().map(Value::to_json).collect())
            }
            ValueKind::Object(map) => JsonValue::Object(
                map.borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            ValueKind::Function(_) | ValueKind::NativeFunction(_) => {
                JsonValue::String(self.to_string())
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::String(s) => write!(f, "{s:?}"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Double(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(_) | ValueKind::Object(_) => write!(f, "{}", self.to_json()),
            ValueKind::Function(fun) => write!(
                f,
                "function {}({}) {{ ... }}",
                fun.name.as_deref().unwrap_or(""),
                fun.params.join(", ")
            ),
            ValueKind::NativeFunction(fun) => write!(f, "function {}(...) {{ [native code] }}", fun.name),
        }
    }
}

pub enum ValueKind {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(RefCell<Vec<Value>>),
    Object(RefCell<ObjectMap>),
    Function(UserFunction),
    NativeFunction(NativeFunction),
}

pub struct UserFunction {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<[Stmt]>,
    pub env: EnvironmentRef,
}

pub type NativeCallback = fn(&mut Interpreter<'_>, &[Value]) -> Result<Value, Diagnostic>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub min_args: usize,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn call(
        &self,
        interpreter: &mut Interpreter<'_>,
        args: &[Value],
        span: SourceSpan,
    ) -> Result<Value, Diagnostic> {
        if args.len() < self.min_args {
            return Err(Diagnostic::runtime(format!(
                "function `{}` expected at least {} arguments but received {}",
                self.name,
                self.min_args,
                args.len()
            ))
            .with_span(span));
        }
        (self.callback)(interpreter, args).map_err(|err| match err.span {
            Some(_) => err,
            None => err.with_span(span),
        })
    }
}
