//! JSON conversion for datasets and command-line output.
//!
//! JSON has no byte strings, so bytes render as arrays of integers and read
//! back as arrays. Map keys that are not text render through `Display`.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde_json::{Map, Number, Value as JsonValue};

/// Convert a JSON document into a value.
///
/// # Errors
///
/// Returns an error for fractional numbers and for integers outside the
/// signed 64-bit range.
pub fn from_json(json: &JsonValue) -> CodecResult<Value> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Bool(*b)),
        JsonValue::Number(n) => number(n),
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        JsonValue::Array(items) => items
            .iter()
            .map(from_json)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array),
        JsonValue::Object(fields) => fields
            .iter()
            .map(|(k, v)| Ok((Value::Text(k.clone()), from_json(v)?)))
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::map),
    }
}

fn number(n: &Number) -> CodecResult<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Integer(i))
    } else if n.is_u64() {
        Err(CodecError::IntegerOverflow)
    } else {
        Err(CodecError::FloatForbidden)
    }
}

/// Convert a value into a JSON document.
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Integer(n) => JsonValue::Number((*n).into()),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => JsonValue::Array(b.iter().map(|byte| JsonValue::from(*byte)).collect()),
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Map(pairs) => {
            let mut object = Map::with_capacity(pairs.len());
            for (k, v) in pairs {
                let name = match k {
                    Value::Text(s) => s.clone(),
                    other => other.to_string(),
                };
                object.insert(name, to_json(v));
            }
            JsonValue::Object(object)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_become_sorted_maps() {
        let value = from_json(&json!({"b": 1, "a": {"c": [true, null, "x"]}})).unwrap();
        assert_eq!(
            value,
            Value::object([
                ("a", Value::object([("c", Value::Array(vec![true.into(), Value::Null, "x".into()]))])),
                ("b", Value::Integer(1)),
            ])
        );
        assert_eq!(to_json(&value), json!({"a": {"c": [true, null, "x"]}, "b": 1}));
    }

    #[test]
    fn fractional_and_huge_numbers_are_rejected() {
        assert_eq!(from_json(&json!(1.5)), Err(CodecError::FloatForbidden));
        assert_eq!(from_json(&json!(u64::MAX)), Err(CodecError::IntegerOverflow));
    }

    #[test]
    fn bytes_and_non_text_keys_render() {
        assert_eq!(to_json(&Value::Bytes(vec![1, 255])), json!([1, 255]));
        let map = Value::map(vec![(Value::Integer(7), Value::from("seven"))]);
        assert_eq!(to_json(&map), json!({"7": "seven"}));
    }
}
