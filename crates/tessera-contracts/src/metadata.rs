//! Event metadata: an ordered map of string keys to primitive values.
//!
//! Metadata is part of the hashed content of every event, so it must have
//! exactly one serialization.  Keys live in a `BTreeMap` (always sorted,
//! whatever order they were inserted in) and values are restricted to the
//! JSON primitives.  Nested arrays or objects are rejected on the way in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TesseraError, TesseraResult};

/// A single primitive metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl TryFrom<Value> for MetadataValue {
    type Error = TesseraError;

    /// Convert a JSON value, refusing anything that is not a primitive.
    fn try_from(value: Value) -> TesseraResult<Self> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::String(s) => Ok(Self::String(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(TesseraError::Serialization {
                        reason: format!("number {} has no canonical representation", n),
                    })
                }
            }
            Value::Array(_) => Err(TesseraError::Serialization {
                reason: "metadata values may not be arrays".to_string(),
            }),
            Value::Object(_) => Err(TesseraError::Serialization {
                reason: "metadata values may not be nested objects".to_string(),
            }),
        }
    }
}

/// Ordered key/value metadata attached to an `AuditEvent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style `insert`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in canonical (lexicographic key) order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    /// Check that every entry can be canonically serialized.
    ///
    /// Rejects empty keys and non-finite floats.  Called by the recorder
    /// before any hashing happens.
    pub fn validate(&self) -> TesseraResult<()> {
        for (key, value) in &self.0 {
            if key.trim().is_empty() {
                return Err(TesseraError::validation(
                    "metadata",
                    "metadata keys must not be empty",
                ));
            }
            if let MetadataValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(TesseraError::Serialization {
                        reason: format!("metadata '{}' holds non-finite float {}", key, f),
                    });
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<Value> for Metadata {
    type Error = TesseraError;

    /// Build metadata from a JSON object (or `null` for empty metadata).
    fn try_from(value: Value) -> TesseraResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, v) in map {
                    let converted = MetadataValue::try_from(v).map_err(|e| match e {
                        TesseraError::Serialization { reason } => TesseraError::Serialization {
                            reason: format!("metadata '{}': {}", key, reason),
                        },
                        other => other,
                    })?;
                    out.insert(key, converted);
                }
                Ok(Self(out))
            }
            other => Err(TesseraError::Serialization {
                reason: format!("metadata must be a JSON object, got {}", json_kind(&other)),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<MetadataValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
