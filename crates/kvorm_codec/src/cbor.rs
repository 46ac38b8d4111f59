//! Canonical CBOR encoding of serde types.

use crate::error::{CodecError, CodecResult};
use ciborium::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value to canonical CBOR bytes.
///
/// The value is first lowered to a CBOR data model, then normalized so that
/// the output only depends on the logical content:
/// - Map keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers use the shortest possible encoding
/// - No indefinite-length encoding
///
/// # Errors
///
/// Returns [`CodecError::NaNForbidden`] if the value contains a NaN float, or
/// [`CodecError::EncodingFailed`] if serde serialization fails.
pub fn to_canonical_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let value =
        Value::serialized(value).map_err(|err| CodecError::encoding_failed(err.to_string()))?;
    let value = canonicalize(value)?;
    write_value(&value)
}

/// Decode a value from CBOR bytes.
///
/// Non-canonical but well-formed input is accepted. The input must hold
/// exactly one CBOR item.
///
/// # Errors
///
/// Returns [`CodecError::DecodingFailed`] for malformed input or a shape
/// mismatch with `T`, and [`CodecError::TrailingBytes`] if input remains.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = bytes;
    let value: T = ciborium::de::from_reader(&mut reader)
        .map_err(|err| CodecError::decoding_failed(err.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: reader.len(),
        });
    }
    Ok(value)
}

fn write_value(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|err| CodecError::encoding_failed(err.to_string()))?;
    Ok(buffer)
}

fn canonicalize(value: Value) -> CodecResult<Value> {
    Ok(match value {
        Value::Float(f) if f.is_nan() => return Err(CodecError::NaNForbidden),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(canonicalize)
                .collect::<CodecResult<_>>()?,
        ),
        Value::Map(pairs) => {
            let mut keyed = Vec::with_capacity(pairs.len());
            for (key, value) in pairs {
                let key = canonicalize(key)?;
                let encoded = write_value(&key)?;
                keyed.push((encoded, key, canonicalize(value)?));
            }
            keyed.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));
            Value::Map(keyed.into_iter().map(|(_, k, v)| (k, v)).collect())
        }
        Value::Tag(tag, inner) => Value::Tag(tag, Box::new(canonicalize(*inner)?)),
        other => other,
    })
}
