//! Canonical CBOR encoding and decoding.
//!
//! All change-set bytes that are hashed or signed must be byte-identical
//! across implementations. This module enforces a single canonical form on
//! top of [`ciborium::Value`]: definite-length arrays and maps, integer map
//! keys sorted by their own canonical encoding, shortest-form integers, and
//! no tags. `ciborium`'s own serializer already always emits definite
//! lengths and shortest-form integers; what is missing is map-key ordering
//! and tag rejection, which this module adds on top.

use ciborium::Value;

use crate::error::CodecError;

/// Encodes a value into its canonical CBOR byte representation.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let canonical = canonicalize(value.clone())?;
    let mut out = Vec::new();
    ciborium::into_writer(&canonical, &mut out).map_err(|err| CodecError::Encode(err.to_string()))?;
    Ok(out)
}

/// Decodes canonical CBOR bytes into a value, rejecting any input that is
/// not itself the canonical encoding of the value it represents.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|err| CodecError::Cbor(err.to_string()))?;
    let reencoded = encode(&value)?;
    if reencoded != bytes {
        return Err(CodecError::NonCanonical);
    }
    Ok(value)
}

/// Recursively sorts map keys by their canonical encoding, rejects tags,
/// and rejects maps that (after canonicalization) contain a duplicate key.
fn canonicalize(value: Value) -> Result<Value, CodecError> {
    match value {
        Value::Map(entries) => {
            let mut keyed = Vec::with_capacity(entries.len());
            for (key, val) in entries {
                let key = canonicalize(key)?;
                let val = canonicalize(val)?;
                let mut key_bytes = Vec::new();
                ciborium::into_writer(&key, &mut key_bytes)
                    .map_err(|err| CodecError::Encode(err.to_string()))?;
                keyed.push((key_bytes, key, val));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            for pair in keyed.windows(2) {
                if pair[0].0 == pair[1].0 {
                    return Err(CodecError::DuplicateMapKey);
                }
            }
            Ok(Value::Map(
                keyed.into_iter().map(|(_, key, val)| (key, val)).collect(),
            ))
        }
        Value::Array(items) => {
            let items = items
                .into_iter()
                .map(canonicalize)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(items))
        }
        Value::Tag(_, _) => Err(CodecError::TagNotAllowed),
        other => Ok(other),
    }
}

/// Convenience: canonically encodes any [`serde::Serialize`] value by first
/// routing it through `ciborium`'s value representation.
pub fn encode_serde<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let value = Value::serialized(value).map_err(|err| CodecError::Encode(err.to_string()))?;
    encode(&value)
}

/// Convenience: decodes canonical CBOR bytes directly into a
/// [`serde::de::DeserializeOwned`] type.
pub fn decode_serde<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let value = decode(bytes)?;
    value
        .deserialized()
        .map_err(|err| CodecError::Shape(err.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn round_trips_sorted_map() {
        let value = Value::Map(vec![
            (Value::Integer(2.into()), Value::Text("b".into())),
            (Value::Integer(1.into()), Value::Text("a".into())),
        ]);
        let encoded = encode(&value).expect("encode");
        let decoded = decode(&encoded).expect("decode");
        match decoded {
            Value::Map(entries) => {
                assert_eq!(entries[0].0, Value::Integer(1.into()));
                assert_eq!(entries[1].0, Value::Integer(2.into()));
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn encoding_is_deterministic_regardless_of_input_order() {
        let a = Value::Map(vec![
            (Value::Integer(1.into()), Value::Bool(true)),
            (Value::Integer(2.into()), Value::Bool(false)),
        ]);
        let b = Value::Map(vec![
            (Value::Integer(2.into()), Value::Bool(false)),
            (Value::Integer(1.into()), Value::Bool(true)),
        ]);
        assert_eq!(encode(&a).expect("encode a"), encode(&b).expect("encode b"));
    }

    #[test]
    fn rejects_tags() {
        let value = Value::Tag(0, Box::new(Value::Text("2024".into())));
        assert!(matches!(encode(&value), Err(CodecError::TagNotAllowed)));
    }

    #[test]
    fn rejects_non_canonical_bytes() {
        // A two-element array encoded with an indefinite-length head (0x9f ... 0xff)
        // decodes to the same value as the definite-length form but is not
        // itself canonical.
        let indefinite = vec![0x9f, 0x01, 0x02, 0xff];
        assert!(matches!(
            decode(&indefinite),
            Err(CodecError::NonCanonical)
        ));
    }
}
