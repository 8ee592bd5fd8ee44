//! Normalized market data records
//!
//! Records arrive as dynamically shaped JSON from the exchange adapters. They
//! are converted once, at the edge, into an ordered map of [`FieldValue`] so
//! downstream code (projection, escaping, SQL rendering) can match on a closed
//! set of variants instead of poking at untyped JSON.

use crate::types::data_type::DataType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered field map. Insertion order is the order the producer emitted.
pub type FieldMap = IndexMap<String, FieldValue>;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<FieldValue>),
    Map(FieldMap),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert back into JSON, e.g. for nested column encoding or dead-lettering.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Number(n) => serde_json::Value::Number(n.clone()),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::List(items) => {
                serde_json::Value::Array(items.iter().map(FieldValue::to_json).collect())
            }
            FieldValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Number(n) => FieldValue::Number(n),
            serde_json::Value::String(s) => FieldValue::Text(s),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Object(map) => FieldValue::Map(
                map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("payload is not a JSON object (got {kind})")]
    NotAnObject { kind: &'static str },
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One normalized market data record, tagged with its data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data_type: DataType,
    pub fields: FieldMap,
}

impl Record {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            fields: FieldMap::new(),
        }
    }

    /// Build a record from a decoded JSON payload. Only objects are accepted.
    pub fn from_json(data_type: DataType, payload: serde_json::Value) -> Result<Self, RecordError> {
        match payload {
            serde_json::Value::Object(map) => Ok(Self {
                data_type,
                fields: map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect(),
            }),
            other => Err(RecordError::NotAnObject {
                kind: json_kind(&other),
            }),
        }
    }

    /// Decode raw bytes from the bus.
    pub fn from_slice(data_type: DataType, bytes: &[u8]) -> Result<Self, RecordError> {
        let payload: serde_json::Value = serde_json::from_slice(bytes)?;
        Self::from_json(data_type, payload)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Builder-style setter (overwrites).
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Set `field` only when it is absent or null.
    pub fn with_default(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        let missing = self.fields.get(field).map_or(true, FieldValue::is_null);
        if missing {
            self.fields.insert(field.to_string(), value.into());
        }
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
