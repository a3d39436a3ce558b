//! Core store types
//!
//! - `Document`: id plus JSON object body
//! - `FieldValue`: a value or a server-side transform for one field
//! - `WriteSet`: ordered field writes applied to one document

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Document id within its collection
    pub id: String,
    /// Document body
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Get a field from the body
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Get a string field, `None` if missing or not a string
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    /// True if `name` is an array holding an element equal to `value`
    pub fn array_contains(&self, name: &str, value: &Value) -> bool {
        self.data
            .get(name)
            .and_then(Value::as_array)
            .map(|items| items.iter().any(|item| item == value))
            .unwrap_or(false)
    }

    /// Body as a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }

    /// Body with the id merged in under each of `id_keys`
    pub fn into_value_with_id(self, id_keys: &[&str]) -> Value {
        let mut data = self.data;
        for key in id_keys {
            data.insert((*key).to_string(), Value::String(self.id.clone()));
        }
        Value::Object(data)
    }
}

/// How `set` treats fields not named in the write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole body
    Overwrite,
    /// Keep untouched fields
    Merge,
}

/// A write to one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain value
    Value(Value),
    /// Append each element unless a deep-equal element already exists
    ArrayUnion(Vec<Value>),
    /// Add to a numeric field, a missing field counts as zero
    Increment(i64),
    /// Store clock in milliseconds since the epoch at write time
    ServerTimestamp,
}

impl FieldValue {
    /// Resolve this write against the current field value
    pub fn resolve(&self, current: Option<&Value>, now_ms: i64) -> Value {
        match self {
            FieldValue::Value(v) => v.clone(),
            FieldValue::ArrayUnion(elements) => {
                let mut items = match current {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                for element in elements {
                    if !items.contains(element) {
                        items.push(element.clone());
                    }
                }
                Value::Array(items)
            }
            FieldValue::Increment(by) => increment(current, *by),
            FieldValue::ServerTimestamp => Value::from(now_ms),
        }
    }
}

fn increment(current: Option<&Value>, by: i64) -> Value {
    match current {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Value::from(i.saturating_add(by))
            } else if let Some(f) = n.as_f64() {
                Number::from_f64(f + by as f64)
                    .map(Value::Number)
                    .unwrap_or(Value::from(by))
            } else {
                Value::from(by)
            }
        }
        _ => Value::from(by),
    }
}

/// Ordered field writes for a single document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
    fields: Vec<(String, FieldValue)>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain values for every entry of a JSON object
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, FieldValue::Value(v)))
                .collect(),
        }
    }

    /// Write a plain value
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .push((field.into(), FieldValue::Value(value.into())));
        self
    }

    /// Write a plain value only when present
    pub fn set_opt(self, field: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.set(field, v),
            None => self,
        }
    }

    /// Array-union `values` into `field`
    pub fn array_union(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields
            .push((field.into(), FieldValue::ArrayUnion(values)));
        self
    }

    /// Increment a numeric field
    pub fn increment(mut self, field: impl Into<String>, by: i64) -> Self {
        self.fields.push((field.into(), FieldValue::Increment(by)));
        self
    }

    /// Stamp a field with the store clock
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldValue::ServerTimestamp));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Apply the writes to `base` in order
    pub fn apply(&self, base: &mut Map<String, Value>, now_ms: i64) {
        for (field, write) in &self.fields {
            let resolved = write.resolve(base.get(field), now_ms);
            base.insert(field.clone(), resolved);
        }
    }

    /// Compute the new body of a document given its current body
    pub fn apply_to(
        &self,
        current: Option<Map<String, Value>>,
        mode: SetMode,
        now_ms: i64,
    ) -> Map<String, Value> {
        let mut base = match mode {
            SetMode::Merge => current.unwrap_or_default(),
            SetMode::Overwrite => Map::new(),
        };
        self.apply(&mut base, now_ms);
        base
    }
}

/// Current store clock in milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
