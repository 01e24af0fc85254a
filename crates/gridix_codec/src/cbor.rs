//! CBOR value bytes.
//!
//! Swapped cache entries travel as CBOR bytes. These helpers convert between
//! [`Value`] and those bytes using `ciborium`'s dynamic value model.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::{Integer, Value as CborValue};

/// Encode a value to CBOR bytes.
///
/// Map keys are already sorted by [`Value::map`], so equal values always
/// produce identical bytes.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&to_cbor_value(value), &mut bytes)
        .map_err(|e| CodecError::encoding_failed(format!("{e:?}")))?;
    Ok(bytes)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, contain floats,
/// or hold integers outside the signed 64-bit range.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let raw: CborValue = ciborium::de::from_reader(bytes)
        .map_err(|e| CodecError::decoding_failed(format!("{e:?}")))?;
    from_cbor_value(raw)
}

fn to_cbor_value(value: &Value) -> CborValue {
    match value {
        Value::Null => CborValue::Null,
        Value::Bool(b) => CborValue::Bool(*b),
        Value::Integer(n) => CborValue::Integer(Integer::from(*n)),
        Value::Text(s) => CborValue::Text(s.clone()),
        Value::Bytes(b) => CborValue::Bytes(b.clone()),
        Value::Array(items) => CborValue::Array(items.iter().map(to_cbor_value).collect()),
        Value::Map(pairs) => CborValue::Map(
            pairs
                .iter()
                .map(|(k, v)| (to_cbor_value(k), to_cbor_value(v)))
                .collect(),
        ),
    }
}

fn from_cbor_value(raw: CborValue) -> CodecResult<Value> {
    match raw {
        CborValue::Null => Ok(Value::Null),
        CborValue::Bool(b) => Ok(Value::Bool(b)),
        CborValue::Integer(n) => i64::try_from(i128::from(n))
            .map(Value::Integer)
            .map_err(|_| CodecError::IntegerOverflow),
        CborValue::Text(s) => Ok(Value::Text(s)),
        CborValue::Bytes(b) => Ok(Value::Bytes(b)),
        CborValue::Float(_) => Err(CodecError::FloatForbidden),
        // Tags carry no meaning for indexing.
        CborValue::Tag(_, inner) => from_cbor_value(*inner),
        CborValue::Array(items) => items
            .into_iter()
            .map(from_cbor_value)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array),
        CborValue::Map(pairs) => pairs
            .into_iter()
            .map(|(k, v)| Ok((from_cbor_value(k)?, from_cbor_value(v)?)))
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::map),
        _ => Err(CodecError::unsupported_type("unknown CBOR item")),
    }
}
