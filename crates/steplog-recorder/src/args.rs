//! Tagged argument shapes for key/value operations.
//!
//! `add_data`, `add_returns` and `add_done` accept either a `(key, value)`
//! pair or a single-entry record such as `{"user": {...}}`. [`DataArg`] makes
//! the two shapes explicit; [`DataArg::from_json`] is the entry point for
//! dynamically shaped input and rejects anything else.

use serde_json::{Map, Value};
use steplog_core::DataEntry;

use crate::error::RecorderError;

/// A key/value argument in one of its two accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum DataArg {
    /// Explicit key and value.
    Keyed { key: String, val: Value },
    /// Record shorthand. Must hold exactly one entry.
    Record(Map<String, Value>),
}

impl DataArg {
    pub fn keyed(key: impl Into<String>, val: impl Into<Value>) -> Self {
        DataArg::Keyed {
            key: key.into(),
            val: val.into(),
        }
    }

    /// Classifies a dynamically shaped argument.
    ///
    /// A string is a key (paired with `value`, or `null` when absent); an
    /// object is a record and `value` is ignored. Any other JSON type is a
    /// contract violation.
    pub fn from_json(
        operation: &'static str,
        key_or_record: Value,
        value: Option<Value>,
    ) -> Result<Self, RecorderError> {
        match key_or_record {
            Value::String(key) => Ok(DataArg::Keyed {
                key,
                val: value.unwrap_or(Value::Null),
            }),
            Value::Object(record) => Ok(DataArg::Record(record)),
            other => Err(RecorderError::InvalidArgument {
                operation,
                reason: format!(
                    "expected a string key or a single-entry object, got {}",
                    json_type_name(&other)
                ),
            }),
        }
    }

    /// Normalizes to a single entry.
    pub fn into_entry(self, operation: &'static str) -> Result<DataEntry, RecorderError> {
        match self {
            DataArg::Keyed { key, val } => Ok(DataEntry { key, val }),
            DataArg::Record(record) => {
                if record.len() != 1 {
                    return Err(RecorderError::InvalidArgument {
                        operation,
                        reason: format!(
                            "record shorthand must have exactly one entry, got {}",
                            record.len()
                        ),
                    });
                }
                let (key, val) = record
                    .into_iter()
                    .next()
                    .ok_or_else(|| RecorderError::InvalidArgument {
                        operation,
                        reason: "record shorthand is empty".into(),
                    })?;
                Ok(DataEntry { key, val })
            }
        }
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for DataArg {
    fn from((key, val): (K, V)) -> Self {
        DataArg::keyed(key, val)
    }
}

impl From<Map<String, Value>> for DataArg {
    fn from(record: Map<String, Value>) -> Self {
        DataArg::Record(record)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
