use indexmap::IndexMap;
use serde_json::Value;

use crate::telemetry::{FieldValue, RawMeasurement};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("payload is not a JSON object: got {0}")]
    NotAnObject(&'static str),

    #[error("value for key {key:?} is not flat: got {kind}")]
    Nested { key: String, kind: &'static str },
}

pub fn decode_payload(payload: &[u8]) -> Result<RawMeasurement, DecodeError> {
    // Parsed straight into an ordered map; `Value::Object` would sort the keys.
    let object: IndexMap<String, Value> = match serde_json::from_slice(payload) {
        Ok(object) => object,
        Err(err) => {
            return match serde_json::from_slice::<Value>(payload) {
                Ok(value) => Err(DecodeError::NotAnObject(kind_of(&value))),
                Err(_) => Err(DecodeError::Malformed(err)),
            };
        }
    };

    object
        .into_iter()
        .map(|(key, value)| decode_value(&key, value).map(|value| (key, value)))
        .collect()
}

fn decode_value(key: &str, value: Value) -> Result<FieldValue, DecodeError> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Number(n) => match n.as_f64() {
            Some(v) => Ok(FieldValue::Number(v)),
            None => Ok(FieldValue::Text(n.to_string())),
        },
        Value::String(s) => Ok(FieldValue::Text(s)),
        Value::Bool(b) => Ok(FieldValue::Text(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(DecodeError::Nested {
            key: key.to_string(),
            kind: kind_of(&value),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
