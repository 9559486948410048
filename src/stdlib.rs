use std::{fs, path::Path};

use crate::{
    diagnostics::Diagnostic,
    runtime::Interpreter,
    scope::Scope,
    value::{NativeCallback, NativeFunction, ObjectMap, Value, ValueKind},
};

type Result<T> = std::result::Result<T, Diagnostic>;

/// Defines the global builtin functions in `scope`.
pub fn install(scope: &Scope<'_>) {
    let builtins: [(&'static str, usize, NativeCallback); 17] = [
        ("print", 0, print),
        ("length", 1, length),
        ("keys", 1, keys),
        ("values", 1, values),
        ("type", 1, type_of),
        ("push", 1, push),
        ("pop", 1, pop),
        ("join", 2, join),
        ("split", 2, split),
        ("uc", 1, uc),
        ("lc", 1, lc),
        ("exists", 2, exists),
        ("die", 0, die),
        ("json", 1, json),
        ("int", 1, int),
        ("require", 1, require),
        ("sprintf", 1, sprintf),
    ];
    for (name, min_args, callback) in builtins {
        scope.define(name, native(name, min_args, callback));
    }
}

/// Modules `require` resolves without touching the filesystem.
pub fn builtin_module(name: &str) -> Option<Value> {
    match name {
        "math" => Some(module(&[
            ("abs", 1, math_abs),
            ("pow", 2, math_pow),
            ("sqrt", 1, math_sqrt),
            ("floor", 1, math_floor),
            ("ceil", 1, math_ceil),
        ])),
        "fs" => Some(module(&[
            ("readfile", 1, fs_readfile),
            ("writefile", 2, fs_writefile),
            ("access", 1, fs_access),
        ])),
        _ => None,
    }
}

fn module(members: &[(&'static str, usize, NativeCallback)]) -> Value {
    let exports: ObjectMap = members
        .iter()
        .map(|&(member, min_args, callback)| {
            (member.to_string(), native(member, min_args, callback))
        })
        .collect();
    Value::object(exports)
}

fn native(name: &'static str, min_args: usize, callback: NativeCallback) -> Value {
    Value::new(ValueKind::NativeFunction(NativeFunction {
        name,
        min_args,
        callback,
    }))
}

fn expect_string<'v>(value: &'v Value, name: &str) -> Result<&'v str> {
    value.as_str().ok_or_else(|| {
        Diagnostic::runtime(format!(
            "`{name}` expected string but found {}",
            value.type_name()
        ))
    })
}

fn expect_number(value: &Value, name: &str) -> Result<f64> {
    match &*value.0 {
        ValueKind::Int(n) => Ok(*n as f64),
        ValueKind::Double(f) => Ok(*f),
        _ => Err(Diagnostic::runtime(format!(
            "`{name}` expected number but found {}",
            value.type_name()
        ))),
    }
}

fn print(interpreter: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let mut written = 0usize;
    let out = interpreter.output();
    for arg in args {
        let text = arg.to_string();
        out.write_all(text.as_bytes())
            .map_err(|err| Diagnostic::runtime(format!("unable to write output: {err}")))?;
        written += text.len();
    }
    Ok(Value::int(i64::try_from(written).unwrap_or(i64::MAX)))
}

fn length(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let len = match &*args[0].0 {
        ValueKind::String(s) => s.len(),
        ValueKind::Array(items) => items.borrow().len(),
        ValueKind::Object(map) => map.borrow().len(),
        _ => return Ok(Value::null()),
    };
    Ok(Value::int(len as i64))
}

fn keys(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    Ok(match args[0].as_object() {
        Some(map) => Value::array(map.keys().cloned().map(Value::string).collect()),
        None => Value::null(),
    })
}

fn values(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    Ok(match args[0].as_object() {
        Some(map) => Value::array(map.values().cloned().collect()),
        None => Value::null(),
    })
}

fn type_of(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    if args[0].is_null() {
        return Ok(Value::null());
    }
    Ok(Value::string(args[0].type_name()))
}

fn push(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let Some(mut items) = args[0].as_array_mut() else {
        return Ok(Value::null());
    };
    items.extend(args[1..].iter().cloned());
    Ok(args[1..].last().cloned().unwrap_or_else(Value::null))
}

fn pop(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    Ok(args[0]
        .as_array_mut()
        .and_then(|mut items| items.pop())
        .unwrap_or_else(Value::null))
}

fn join(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let separator = expect_string(&args[0], "join")?;
    let Some(items) = args[1].as_array() else {
        return Ok(Value::null());
    };
    let pieces: Vec<String> = items.iter().map(Value::to_string).collect();
    Ok(Value::string(pieces.join(separator)))
}

fn split(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "split")?;
    let separator = expect_string(&args[1], "split")?;
    let parts = if separator.is_empty() {
        text.chars().map(|ch| Value::string(ch.to_string())).collect()
    } else {
        text.split(separator).map(Value::string).collect()
    };
    Ok(Value::array(parts))
}

fn uc(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].to_string().to_uppercase()))
}

fn lc(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    Ok(Value::string(args[0].to_string().to_lowercase()))
}

fn exists(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let key = args[1].to_string();
    Ok(Value::bool(
        args[0].as_object().is_some_and(|map| map.contains_key(&key)),
    ))
}

fn die(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let message = match args.first() {
        Some(value) => value.to_string(),
        None => "Died".to_string(),
    };
    Err(Diagnostic::runtime(message))
}

fn json(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let text = expect_string(&args[0], "json")?;
    serde_json::from_str(text)
        .map(Value::from_json)
        .map_err(|err| Diagnostic::runtime(format!("failed to parse JSON string: {err}")))
}

fn int(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let parsed = match &*args[0].0 {
        ValueKind::Int(n) => Some(*n),
        ValueKind::Double(f) if f.is_finite() => Some(f.trunc() as i64),
        ValueKind::Bool(b) => Some(i64::from(*b)),
        ValueKind::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    Ok(match parsed {
        Some(n) => Value::int(n),
        None => Value::double(f64::NAN),
    })
}

fn require(interpreter: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let name = expect_string(&args[0], "require")?;
    interpreter.require(name)
}

/// `%s`, `%d` and `%J` (JSON) substitution; `%%` is a literal percent.
fn sprintf(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let format = expect_string(&args[0], "sprintf")?;
    let mut params = args[1..].iter();
    let mut output = String::with_capacity(format.len());
    let mut chars = format.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => output.push('%'),
            Some('s') => {
                if let Some(value) = params.next() {
                    output.push_str(&value.to_string());
                }
            }
            Some('d') => {
                if let Some(value) = params.next() {
                    let number = expect_number(value, "sprintf").unwrap_or(0.0);
                    output.push_str(&(number.trunc() as i64).to_string());
                }
            }
            Some('J') => {
                if let Some(value) = params.next() {
                    output.push_str(&value.to_json().to_string());
                }
            }
            Some(other) => {
                output.push('%');
                output.push(other);
            }
            None => output.push('%'),
        }
    }
    Ok(Value::string(output))
}

fn math_abs(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    match &*args[0].0 {
        ValueKind::Int(n) => Ok(Value::int(n.wrapping_abs())),
        _ => Ok(Value::double(expect_number(&args[0], "abs")?.abs())),
    }
}

fn math_pow(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let base = expect_number(&args[0], "pow")?;
    let exponent = expect_number(&args[1], "pow")?;
    Ok(Value::double(base.powf(exponent)))
}

fn math_sqrt(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    Ok(Value::double(expect_number(&args[0], "sqrt")?.sqrt()))
}

fn math_floor(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    Ok(Value::double(expect_number(&args[0], "floor")?.floor()))
}

fn math_ceil(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    Ok(Value::double(expect_number(&args[0], "ceil")?.ceil()))
}

fn fs_readfile(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "readfile")?;
    fs::read_to_string(path)
        .map(Value::string)
        .map_err(|err| io_error("readfile", path, err))
}

fn fs_writefile(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "writefile")?;
    let contents = args[1].to_string();
    fs::write(path, &contents)
        .map(|()| Value::int(contents.len() as i64))
        .map_err(|err| io_error("writefile", path, err))
}

fn fs_access(_: &mut Interpreter<'_>, args: &[Value]) -> Result<Value> {
    let path = expect_string(&args[0], "access")?;
    Ok(Value::bool(Path::new(path).exists()))
}

fn io_error(name: &str, path: &str, err: std::io::Error) -> Diagnostic {
    let mut diagnostic = Diagnostic::runtime(format!("`{name}` failed for `{path}`: {err}"));
    if let Some(code) = err.raw_os_error() {
        diagnostic = diagnostic.with_note(format!("os error code: {code}"));
    }
    diagnostic
}
