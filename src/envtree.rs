//! Initial global variables supplied through `-e` and `-E`.

use std::io::Read;

use serde_json::{Deserializer, Map, Value as JsonValue};
use tracing::debug;

use crate::diagnostics::{Result, UcodeError};

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_identifier(key: &str) -> String {
    key.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Splits a `-e`/`-E` argument on its first `=` into `(prefix, payload)`.
pub fn split_prefix(argument: &str) -> (&str, &str) {
    match argument.split_once('=') {
        Some((prefix, payload)) => (prefix, payload),
        None => ("", argument),
    }
}

/// Streams one JSON document from `reader` and requires a top-level object.
///
/// `flag` names the option the payload came from and is reported on failure.
pub fn parse_env_payload(reader: impl Read, flag: char) -> Result<Map<String, JsonValue>> {
    let invalid = |detail: String| UcodeError::Environment { flag, detail };
    let mut stream = Deserializer::from_reader(reader).into_iter::<JsonValue>();
    let parsed = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(err)) => return Err(invalid(err.to_string())),
        None => return Err(invalid("no JSON value found".into())),
    };
    match stream.next() {
        None => {}
        Some(Ok(_)) => return Err(invalid("trailing data after JSON value".into())),
        Some(Err(err)) => return Err(invalid(err.to_string())),
    }
    match parsed {
        JsonValue::Object(map) => Ok(map),
        other => Err(invalid(format!("found {}", json_type_name(&other)))),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Accumulates environment objects into one tree of initial globals.
///
/// The tree is built completely before any scope exists and is consumed
/// once by the orchestrator.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EnvTree {
    root: Option<Map<String, JsonValue>>,
}

impl EnvTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.root.as_ref().and_then(|root| root.get(key))
    }

    /// Moves every pair of `object` into the tree.
    ///
    /// An empty prefix targets the root; otherwise the pairs land in the
    /// nested object stored under the sanitized prefix, which is created on
    /// first use. Later merges overwrite earlier keys.
    pub fn merge(&mut self, prefix: &str, object: Map<String, JsonValue>) {
        debug!(prefix, keys = object.len(), "merging environment object");
        let root = self.root.get_or_insert_with(Map::new);
        if prefix.is_empty() {
            insert_sanitized(root, object);
            return;
        }

        let slot = root
            .entry(sanitize_identifier(prefix))
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !slot.is_object() {
            *slot = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(nested) = slot {
            insert_sanitized(nested, object);
        }
    }

    pub fn into_map(self) -> Option<Map<String, JsonValue>> {
        self.root
    }
}

fn insert_sanitized(target: &mut Map<String, JsonValue>, object: Map<String, JsonValue>) {
    for (key, value) in object {
        target.insert(sanitize_identifier(&key), value);
    }
}
