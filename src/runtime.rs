use std::{fs, io::Write, mem, path::Path, rc::Rc};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Literal, LogicalOp, Stmt, StmtKind, UnaryOp},
    config::SEARCH_PATH_GLOBAL,
    diagnostics::{Diagnostic, SourceSpan},
    environment::{Environment, EnvironmentRef},
    parser,
    scope::Scope,
    stdlib,
    value::{ObjectMap, UserFunction, Value, ValueKind},
};

const MAX_CALL_DEPTH: usize = 200;

type Result<T> = std::result::Result<T, Diagnostic>;

/// Tree-walking evaluator for one execution against a root scope.
pub struct Interpreter<'a> {
    root: &'a Scope<'a>,
    env: EnvironmentRef,
    out: &'a mut dyn Write,
    strict: bool,
    modules: &'a mut IndexMap<String, Value>,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        root: &'a Scope<'a>,
        out: &'a mut dyn Write,
        strict: bool,
        modules: &'a mut IndexMap<String, Value>,
    ) -> Self {
        Self {
            root,
            env: Environment::new(),
            out,
            strict,
            modules,
            depth: 0,
        }
    }

    pub fn root(&self) -> &'a Scope<'a> {
        self.root
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    /// Runs a statement list as a function body and yields its return value.
    pub fn run(&mut self, body: &[Stmt]) -> Result<Value> {
        for stmt in body {
            match self.execute_statement(stmt)? {
                FlowControl::Next => {}
                FlowControl::Return(value) => return Ok(value),
                FlowControl::Break => {
                    return Err(Diagnostic::runtime("`break` outside loop").with_span(stmt.span));
                }
                FlowControl::Continue => {
                    return Err(
                        Diagnostic::runtime("`continue` outside loop").with_span(stmt.span)
                    );
                }
            }
        }
        Ok(Value::null())
    }

    /// Resolves a module by name, loading and caching it on first use.
    ///
    /// Builtin modules win over files; file patterns come from the
    /// `REQUIRE_SEARCH_PATH` global with `*` standing for the module path.
    pub fn require(&mut self, name: &str) -> Result<Value> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }

        let module = match stdlib::builtin_module(name) {
            Some(module) => module,
            None => self.load_module_file(name)?,
        };
        debug!(module = name, "loaded module");
        self.modules.insert(name.to_string(), module.clone());
        Ok(module)
    }

    fn load_module_file(&mut self, name: &str) -> Result<Value> {
        let relative = name.replace('.', "/");
        let patterns = self
            .root
            .lookup(SEARCH_PATH_GLOBAL)
            .and_then(|paths| {
                paths.as_array().map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect::<Vec<_>>()
                })
            })
            .unwrap_or_default();

        for pattern in patterns {
            if !pattern.contains('*') {
                continue;
            }
            if !pattern.ends_with(".uc") {
                trace!(pattern = %pattern, "skipping non-script search path entry");
                continue;
            }
            let candidate = pattern.replace('*', &relative);
            if !Path::new(&candidate).is_file() {
                continue;
            }

            let text = fs::read_to_string(&candidate).map_err(|err| {
                Diagnostic::runtime(format!("unable to read module `{candidate}`: {err}"))
            })?;
            let body = parser::parse_program(&text).map_err(|err| {
                Diagnostic::runtime(format!(
                    "unable to compile module `{candidate}`: {}",
                    err.message
                ))
            })?;
            let previous = mem::replace(&mut self.env, Environment::new());
            let result = self.run(&body);
            self.env = previous;
            return result.map_err(|err| {
                Diagnostic::runtime(format!("error in module `{candidate}`: {}", err.message))
            });
        }

        Err(Diagnostic::runtime(format!(
            "No module named '{name}' could be found"
        )))
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        match &stmt.kind {
            StmtKind::Let(declarations) => {
                for (name, initializer) in declarations {
                    let value = match initializer {
                        Some(expr) => self.evaluate(expr)?,
                        None => Value::null(),
                    };
                    self.env.borrow_mut().define(name.clone(), value);
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Function { name, params, body } => {
                let function = self.make_function(Some(name.clone()), params, body);
                self.env.borrow_mut().define(name.clone(), function);
                Ok(FlowControl::Next)
            }
            StmtKind::Expr(expr) => {
                self.evaluate(expr)?;
                Ok(FlowControl::Next)
            }
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_scoped(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_scoped(branch)
                } else {
                    Ok(FlowControl::Next)
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_scoped(body)? {
                        FlowControl::Next | FlowControl::Continue => {}
                        FlowControl::Break => break,
                        FlowControl::Return(value) => return Ok(FlowControl::Return(value)),
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::ForIn {
                binding,
                iterable,
                body,
            } => {
                let iterable_value = self.evaluate(iterable)?;
                for item in self.iterate(&iterable_value, iterable.span)? {
                    let child = Environment::with_parent(Rc::clone(&self.env));
                    child.borrow_mut().define(binding.clone(), item);
                    let previous = mem::replace(&mut self.env, child);
                    let flow = self.execute_statement(body);
                    self.env = previous;
                    match flow? {
                        FlowControl::Next | FlowControl::Continue => {}
                        FlowControl::Break => break,
                        FlowControl::Return(value) => return Ok(FlowControl::Return(value)),
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::null(),
                };
                Ok(FlowControl::Return(value))
            }
            StmtKind::Break => Ok(FlowControl::Break),
            StmtKind::Continue => Ok(FlowControl::Continue),
        }
    }

    /// Executes a branch or loop body, giving bare statements their own block.
    fn execute_scoped(&mut self, stmt: &Stmt) -> Result<FlowControl> {
        match &stmt.kind {
            StmtKind::Block(statements) => self.execute_block(statements),
            _ => self.execute_block(std::slice::from_ref(stmt)),
        }
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<FlowControl> {
        let child = Environment::with_parent(Rc::clone(&self.env));
        let previous = mem::replace(&mut self.env, child);
        let mut flow = Ok(FlowControl::Next);
        for stmt in statements {
            flow = self.execute_statement(stmt);
            if !matches!(flow, Ok(FlowControl::Next)) {
                break;
            }
        }
        self.env = previous;
        flow
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal(lit)),
            ExprKind::Variable(name) => self.lookup(name, expr.span),
            ExprKind::Binary { op, left, right } => {
                let left_value = self.evaluate(left)?;
                let right_value = self.evaluate(right)?;
                Ok(binary(*op, &left_value, &right_value))
            }
            ExprKind::Logical { op, left, right } => {
                let left_value = self.evaluate(left)?;
                match (op, left_value.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left_value),
                    _ => self.evaluate(right),
                }
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                Ok(unary(*op, &value))
            }
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                self.assign(target, value.clone())?;
                Ok(value)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.evaluate(arg)?);
                }
                self.call(&callee_value, evaluated, expr.span)
            }
            ExprKind::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::ObjectLiteral(entries) => {
                let mut map = ObjectMap::new();
                for (key, value_expr) in entries {
                    let value = self.evaluate(value_expr)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::object(map))
            }
            ExprKind::Index { target, index } => {
                let target_value = self.evaluate(target)?;
                let index_value = self.evaluate(index)?;
                self.index(&target_value, &index_value, expr.span)
            }
            ExprKind::Field { target, field } => {
                let target_value = self.evaluate(target)?;
                self.index(&target_value, &Value::string(field.clone()), expr.span)
            }
            ExprKind::Function { name, params, body } => {
                Ok(self.make_function(name.clone(), params, body))
            }
        }
    }

    fn make_function(&self, name: Option<String>, params: &[String], body: &Rc<[Stmt]>) -> Value {
        Value::new(ValueKind::Function(UserFunction {
            name,
            params: params.to_vec(),
            body: Rc::clone(body),
            env: Rc::clone(&self.env),
        }))
    }

    fn lookup(&self, name: &str, span: SourceSpan) -> Result<Value> {
        if let Some(value) = Environment::get(&self.env, name) {
            return Ok(value);
        }
        if let Some(value) = self.root.lookup(name) {
            return Ok(value);
        }
        if self.strict {
            return Err(
                Diagnostic::runtime(format!("access to undeclared variable {name}"))
                    .with_span(span),
            );
        }
        Ok(Value::null())
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<()> {
        match &target.kind {
            ExprKind::Variable(name) => {
                if Environment::assign(&self.env, name, value.clone())
                    || self.root.assign(name, value.clone())
                {
                    return Ok(());
                }
                if self.strict {
                    return Err(Diagnostic::runtime(format!(
                        "access to undeclared variable {name}"
                    ))
                    .with_span(target.span));
                }
                self.root.define(name.clone(), value);
                Ok(())
            }
            ExprKind::Field { target: owner, field } => {
                let owner_value = self.evaluate(owner)?;
                self.store(&owner_value, &Value::string(field.clone()), value, target.span)
            }
            ExprKind::Index { target: owner, index } => {
                let owner_value = self.evaluate(owner)?;
                let index_value = self.evaluate(index)?;
                self.store(&owner_value, &index_value, value, target.span)
            }
            _ => Err(Diagnostic::runtime("invalid assignment target").with_span(target.span)),
        }
    }

    fn store(&self, owner: &Value, key: &Value, value: Value, span: SourceSpan) -> Result<()> {
        match &*owner.0 {
            ValueKind::Object(map) => {
                map.borrow_mut().insert(property_key(key), value);
                Ok(())
            }
            ValueKind::Array(items) => {
                let index = array_index(key, items.borrow().len()).ok_or_else(|| {
                    Diagnostic::runtime("array index must be a non-negative integer")
                        .with_span(span)
                })?;
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    items.resize(index + 1, Value::null());
                }
                items[index] = value;
                Ok(())
            }
            ValueKind::Null => {
                Err(Diagnostic::runtime("left-hand side expression is null").with_span(span))
            }
            _ => Err(Diagnostic::runtime(format!(
                "cannot set property on value of type {}",
                owner.type_name()
            ))
            .with_span(span)),
        }
    }

    fn index(&self, target: &Value, key: &Value, span: SourceSpan) -> Result<Value> {
        match &*target.0 {
            ValueKind::Object(map) => Ok(map
                .borrow()
                .get(&property_key(key))
                .cloned()
                .unwrap_or_else(Value::null)),
            ValueKind::Array(items) => {
                let items = items.borrow();
                Ok(array_index(key, items.len())
                    .and_then(|index| items.get(index).cloned())
                    .unwrap_or_else(Value::null))
            }
            ValueKind::String(text) => Ok(array_index(key, text.len())
                .and_then(|index| text.get(index..=index))
                .map(Value::string)
                .unwrap_or_else(Value::null)),
            ValueKind::Null => {
                Err(Diagnostic::runtime("left-hand side expression is null").with_span(span))
            }
            _ => Ok(Value::null()),
        }
    }

    pub fn call(&mut self, callee: &Value, args: Vec<Value>, span: SourceSpan) -> Result<Value> {
        match &*callee.0 {
            ValueKind::NativeFunction(fun) => fun.call(self, &args, span),
            ValueKind::Function(fun) => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(Diagnostic::runtime("too much recursion").with_span(span));
                }
                let frame = Environment::with_parent(Rc::clone(&fun.env));
                {
                    let mut frame = frame.borrow_mut();
                    for (idx, name) in fun.params.iter().enumerate() {
                        let value = args.get(idx).cloned().unwrap_or_else(Value::null);
                        frame.define(name.clone(), value);
                    }
                }
                let previous = mem::replace(&mut self.env, frame);
                self.depth += 1;
                let result = self.run(&fun.body);
                self.depth -= 1;
                self.env = previous;
                result
            }
            _ => Err(Diagnostic::runtime(format!(
                "left-hand side of type {} is not a function",
                callee.type_name()
            ))
            .with_span(span)),
        }
    }

    fn iterate(&self, value: &Value, span: SourceSpan) -> Result<Vec<Value>> {
        match &*value.0 {
            ValueKind::Array(items) => Ok(items.borrow().clone()),
            ValueKind::Object(map) => Ok(map.borrow().keys().cloned().map(Value::string).collect()),
            ValueKind::Null => Ok(Vec::new()),
            _ => Err(Diagnostic::runtime(format!(
                "value of type {} is not iterable",
                value.type_name()
            ))
            .with_span(span)),
        }
    }
}

enum FlowControl {
    Next,
    Return(Value),
    Break,
    Continue,
}

fn literal(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::int(*n),
        Literal::Double(n) => Value::double(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Null => Value::null(),
    }
}

/// Object keys are strings; other values use their display form.
fn property_key(key: &Value) -> String {
    match key.as_str() {
        Some(text) => text.to_string(),
        None => key.to_string(),
    }
}

fn array_index(key: &Value, len: usize) -> Option<usize> {
    match &*key.0 {
        ValueKind::Int(n) if *n >= 0 => usize::try_from(*n).ok(),
        ValueKind::Int(n) => len.checked_sub(usize::try_from(n.unsigned_abs()).ok()?),
        _ => None,
    }
}

enum Number {
    Int(i64),
    Double(f64),
}

impl Number {
    fn as_f64(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::Double(n) => *n,
        }
    }
}

fn to_number(value: &Value) -> Number {
    match &*value.0 {
        ValueKind::Int(n) => Number::Int(*n),
        ValueKind::Double(n) => Number::Double(*n),
        ValueKind::Bool(b) => Number::Int(i64::from(*b)),
        ValueKind::Null => Number::Int(0),
        ValueKind::String(text) => {
            let trimmed = text.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                Number::Int(n)
            } else {
                Number::Double(trimmed.parse::<f64>().unwrap_or(f64::NAN))
            }
        }
        _ => Number::Double(f64::NAN),
    }
}

fn number_value(number: Number) -> Value {
    match number {
        Number::Int(n) => Value::int(n),
        Number::Double(n) => Value::double(n),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    use BinaryOp::*;
    match op {
        Add if left.as_str().is_some() || right.as_str().is_some() => {
            Value::string(format!("{left}{right}"))
        }
        Add | Sub | Mul | Div | Mod => arithmetic(op, to_number(left), to_number(right)),
        Equal => Value::bool(equal(left, right)),
        NotEqual => Value::bool(!equal(left, right)),
        Less | LessEqual | Greater | GreaterEqual => Value::bool(compare(op, left, right)),
    }
}

fn arithmetic(op: BinaryOp, left: Number, right: Number) -> Value {
    if let (Number::Int(a), Number::Int(b)) = (&left, &right) {
        let (a, b) = (*a, *b);
        let result = match op {
            BinaryOp::Add => Some(a.wrapping_add(b)),
            BinaryOp::Sub => Some(a.wrapping_sub(b)),
            BinaryOp::Mul => Some(a.wrapping_mul(b)),
            BinaryOp::Div if b != 0 && a.wrapping_rem(b) == 0 => Some(a.wrapping_div(b)),
            BinaryOp::Mod if b != 0 => Some(a.wrapping_rem(b)),
            _ => None,
        };
        if let Some(result) = result {
            return Value::int(result);
        }
    }
    let (a, b) = (left.as_f64(), right.as_f64());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    number_value(Number::Double(result))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let ordering = match (left.as_str(), right.as_str()) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => to_number(left).as_f64().partial_cmp(&to_number(right).as_f64()),
    };
    match ordering {
        Some(ordering) => match op {
            BinaryOp::Less => ordering.is_lt(),
            BinaryOp::LessEqual => ordering.is_le(),
            BinaryOp::Greater => ordering.is_gt(),
            _ => ordering.is_ge(),
        },
        None => false,
    }
}

pub fn equal(left: &Value, right: &Value) -> bool {
    match (&*left.0, &*right.0) {
        (ValueKind::Null, ValueKind::Null) => true,
        (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
        (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
        (ValueKind::Int(_) | ValueKind::Double(_), ValueKind::Int(_) | ValueKind::Double(_)) => {
            to_number(left).as_f64() == to_number(right).as_f64()
        }
        (ValueKind::String(a), ValueKind::String(b)) => a == b,
        (
            ValueKind::Array(_)
            | ValueKind::Object(_)
            | ValueKind::Function(_)
            | ValueKind::NativeFunction(_),
            _,
        ) => left.same_identity(right),
        _ => false,
    }
}

fn unary(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Negate => match to_number(value) {
            Number::Int(n) => Value::int(n.wrapping_neg()),
            Number::Double(n) => Value::double(-n),
        },
        UnaryOp::Not => Value::bool(!value.is_truthy()),
    }
}
