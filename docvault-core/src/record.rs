// docvault-core/src/record.rs
// Open, schema-less record with one mandatory field: a string `id`

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the only field the store interprets
pub const ID_FIELD: &str = "id";

/// One entry of a collection: an ordered field map.
///
/// Field order is kept as read from disk, so hand-edited files round-trip
/// without reshuffling.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Record holding only an `id`
    pub fn new<S: Into<String>>(id: S) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
        Record { fields }
    }

    /// Field map without an `id` (singleton documents)
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Record { fields }
    }

    /// Accepts JSON objects only
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Record { fields }),
            other => Err(VaultError::InvalidRecord(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The `id`, if present and a string
    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Like [`Record::id`] but an error for records that cannot be stored in
    /// a collection.
    pub fn require_id(&self) -> Result<&str> {
        match self.fields.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Ok(id),
            Some(Value::String(_)) => Err(VaultError::InvalidRecord("'id' is empty".to_string())),
            Some(other) => Err(VaultError::InvalidRecord(format!(
                "'id' must be a string, got {}",
                json_type_name(other)
            ))),
            None => Err(VaultError::InvalidRecord("missing 'id' field".to_string())),
        }
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id() == Some(id)
    }

    /// Field lookup; dots descend into objects and array indexes
    /// (`address.city`, `items.0.name`).
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field.is_empty() {
            return None;
        }
        let mut parts = field.split('.');
        let mut value = self.fields.get(parts.next()?)?;
        for part in parts {
            value = match value {
                Value::Object(map) => map.get(part)?,
                Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        if field.is_empty() {
            return None;
        }
        let mut parts = field.split('.');
        let mut value = self.fields.get_mut(parts.next()?)?;
        for part in parts {
            value = match value {
                Value::Object(map) => map.get_mut(part)?,
                Value::Array(arr) => arr.get_mut(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    /// Soft-delete style boolean flag; absent or non-bool reads as false.
    pub fn is_flagged(&self, field: &str) -> bool {
        matches!(self.get(field), Some(Value::Bool(true)))
    }

    /// Top-level set. Existing fields keep their position.
    pub fn set<S: Into<String>>(&mut self, field: S, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Copy every field of `other` over this record except `id`.
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            if key != ID_FIELD {
                self.fields.insert(key, value);
            }
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

impl TryFrom<Value> for Record {
    type Error = VaultError;

    fn try_from(value: Value) -> Result<Self> {
        Record::from_value(value)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
