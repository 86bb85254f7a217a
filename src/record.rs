//! Typed, optional lookups on dynamically typed snapshot records.
//!
//! Every accessor states the JSON type it expects and returns `None` on a
//! missing key or a type mismatch. Nothing in here fails.

use serde_json::{Map, Number, Value};

/// One parsed input line. Snapshot lines are always JSON objects.
pub type Record = Map<String, Value>;

pub trait RecordExt {
    fn raw(&self, key: &str) -> Option<&Value>;

    fn str_at(&self, key: &str) -> Option<&str> {
        self.raw(key).and_then(Value::as_str)
    }

    fn number_at(&self, key: &str) -> Option<&Number> {
        match self.raw(key) {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        }
    }

    fn bool_at(&self, key: &str) -> Option<bool> {
        self.raw(key).and_then(Value::as_bool)
    }

    fn object_at(&self, key: &str) -> Option<&Map<String, Value>> {
        self.raw(key).and_then(Value::as_object)
    }

    fn array_at(&self, key: &str) -> Option<&Vec<Value>> {
        self.raw(key).and_then(Value::as_array)
    }

    /// Integer identifier that may be encoded either as a JSON integer or as
    /// a string of decimal digits (the snapshot does both for `mag`).
    fn bigint_at(&self, key: &str) -> Option<Number> {
        match self.raw(key)? {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .map(Number::from),
            _ => None,
        }
    }

    /// The value at `key` for verbatim JSON passthrough. `null` counts as
    /// absent so it serializes the same way as a missing key.
    fn json_at(&self, key: &str) -> Option<&Value> {
        self.raw(key).filter(|v| !v.is_null())
    }

    /// Walks nested objects along `path` and returns the string at the end.
    /// Any missing or non-object hop short-circuits to `None`.
    fn str_path(&self, path: &[&str]) -> Option<&str> {
        let (first, rest) = path.split_first()?;
        let mut current = self.raw(first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        current.as_str()
    }
}

impl RecordExt for Map<String, Value> {
    fn raw(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

/// Elements of `items` that are JSON objects; everything else is skipped.
pub fn objects(items: &[Value]) -> impl Iterator<Item = &Map<String, Value>> {
    items.iter().filter_map(Value::as_object)
}

/// Elements of `items` that are JSON strings; everything else is skipped.
pub fn strings(items: &[Value]) -> impl Iterator<Item = &str> {
    items.iter().filter_map(Value::as_str)
}
