//! Minimal partial-update payloads.
//!
//! `diff` answers "what did the edit change": only keys present in the edited
//! record are considered, and values are compared after [`normalize`] so that
//! whitespace padding and the various empty forms do not count as changes.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DiffError;

pub type Record = Map<String, Value>;

/// Canonical form used for comparison. `null` and `""` collapse to `null`,
/// strings are trimmed, containers are normalized recursively.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) if s.is_empty() => Value::Null,
        Value::String(s) => Value::String(s.trim().to_string()),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect(),
        ),
        Value::Number(_) | Value::Bool(_) => value.clone(),
    }
}

/// Absent operands behave like `null`. Object key order is irrelevant.
pub fn equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.map(normalize).unwrap_or(Value::Null);
    let b = b.map(normalize).unwrap_or(Value::Null);
    a == b
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Drops top-level keys holding `null` or `""`.
pub fn clean(record: &Record) -> Record {
    record
        .iter()
        .filter(|(_, v)| !is_empty(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Keys of `edited` whose value differs from `original`, carrying the edited
/// value as given. Without an original every non-empty field is a change.
pub fn diff(original: Option<&Record>, edited: &Record) -> Record {
    let Some(original) = original else {
        return clean(edited);
    };
    let changed: Record = edited
        .iter()
        .filter(|(key, value)| !equal(original.get(key.as_str()), Some(*value)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    clean(&changed)
}

/// [`diff`] over any serializable records.
pub fn diff_records<T: Serialize>(original: Option<&T>, edited: &T) -> Result<Record, DiffError> {
    let edited = to_record(edited)?;
    let original = original.map(to_record).transpose()?;
    Ok(diff(original.as_ref(), &edited))
}

fn to_record<T: Serialize>(value: &T) -> Result<Record, DiffError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(DiffError::NotARecord("null")),
        Value::Bool(_) => Err(DiffError::NotARecord("a boolean")),
        Value::Number(_) => Err(DiffError::NotARecord("a number")),
        Value::String(_) => Err(DiffError::NotARecord("a string")),
        Value::Array(_) => Err(DiffError::NotARecord("an array")),
    }
}
