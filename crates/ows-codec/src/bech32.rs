//! Bech32 id encoding.
//!
//! Every resource id in the ledger is a bech32 string whose human-readable
//! prefix names the resource's kind and whose payload is a 16-byte
//! Blake2b-128 digest. Public keys are occasionally bech32-encoded too (for
//! example, for display in the CLI); those use a 32-byte payload instead.

use bech32::{FromBase32, ToBase32, Variant};

use crate::error::CodecError;

/// Length in bytes of a digest-based id payload.
pub const DIGEST_LEN: usize = 16;
/// Length in bytes of a raw Ed25519 public key payload.
pub const KEY_LEN: usize = 32;

/// Human-readable prefix for project ids.
pub const HRP_PROJECT: &str = "project";
/// Human-readable prefix for change-set ids.
pub const HRP_CHANGES: &str = "changes";
/// Human-readable prefix for node ids.
pub const HRP_NODE: &str = "node";
/// Human-readable prefix for function ids.
pub const HRP_FN: &str = "fn";
/// Human-readable prefix for gateway ids.
pub const HRP_GATEWAY: &str = "gateway";
/// Human-readable prefix for user ids.
pub const HRP_USER: &str = "user";
/// Human-readable prefix for policy ids.
pub const HRP_POLICY: &str = "policy";
/// Human-readable prefix for asset ids.
pub const HRP_ASSET: &str = "asset";

/// Encodes a payload of arbitrary length under the given human-readable
/// prefix using the standard Bech32 variant (not Bech32m).
pub fn encode(hrp: &str, payload: &[u8]) -> Result<String, CodecError> {
    bech32::encode(hrp, payload.to_base32(), Variant::Bech32)
        .map_err(|err| CodecError::Bech32(hrp.to_string(), err.to_string()))
}

/// Decodes a bech32 string into its prefix and raw payload bytes, without
/// checking the prefix or payload length against any expected kind.
pub fn decode_raw(encoded: &str) -> Result<(String, Vec<u8>), CodecError> {
    let (hrp, data, variant) = bech32::decode(encoded)
        .map_err(|err| CodecError::Bech32(encoded.to_string(), err.to_string()))?;
    if variant != Variant::Bech32 {
        return Err(CodecError::Bech32(
            encoded.to_string(),
            "expected bech32 variant, got bech32m".to_string(),
        ));
    }
    let payload = Vec::<u8>::from_base32(&data)
        .map_err(|err| CodecError::Bech32(encoded.to_string(), err.to_string()))?;
    Ok((hrp, payload))
}

/// Encodes a 16-byte digest as a bech32 id under `hrp`.
pub fn encode_digest_id(hrp: &str, digest: &[u8; DIGEST_LEN]) -> Result<String, CodecError> {
    encode(hrp, digest)
}

/// Decodes a bech32 id, requiring the prefix to match `hrp` exactly and the
/// payload to be a 16-byte digest.
pub fn decode_digest_id(encoded: &str, hrp: &str) -> Result<[u8; DIGEST_LEN], CodecError> {
    let (actual_hrp, payload) = decode_raw(encoded)?;
    if actual_hrp != hrp {
        return Err(CodecError::Bech32Prefix {
            id: encoded.to_string(),
            expected: hrp.to_string(),
            actual: actual_hrp,
        });
    }
    if payload.len() != DIGEST_LEN {
        return Err(CodecError::Bech32Length {
            id: encoded.to_string(),
            expected: DIGEST_LEN,
            actual: payload.len(),
        });
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&payload);
    Ok(out)
}

/// Encodes a 32-byte raw Ed25519 public key as a bech32 string under `hrp`.
pub fn encode_key(hrp: &str, key: &[u8; KEY_LEN]) -> Result<String, CodecError> {
    encode(hrp, key)
}

/// Decodes a bech32-encoded public key, requiring the prefix to match `hrp`
/// exactly and the payload to be 32 bytes.
pub fn decode_key(encoded: &str, hrp: &str) -> Result<[u8; KEY_LEN], CodecError> {
    let (actual_hrp, payload) = decode_raw(encoded)?;
    if actual_hrp != hrp {
        return Err(CodecError::Bech32Prefix {
            id: encoded.to_string(),
            expected: hrp.to_string(),
            actual: actual_hrp,
        });
    }
    if payload.len() != KEY_LEN {
        return Err(CodecError::Bech32Length {
            id: encoded.to_string(),
            expected: KEY_LEN,
            actual: payload.len(),
        });
    }
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&payload);
    Ok(out)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn round_trips_digest_id() {
        let digest = [7u8; DIGEST_LEN];
        let encoded = encode_digest_id(HRP_PROJECT, &digest).expect("encode");
        assert!(encoded.starts_with("project1"));
        let decoded = decode_digest_id(&encoded, HRP_PROJECT).expect("decode");
        assert_eq!(decoded, digest);
    }

    #[test]
    fn rejects_wrong_prefix() {
        let digest = [1u8; DIGEST_LEN];
        let encoded = encode_digest_id(HRP_PROJECT, &digest).expect("encode");
        let err = decode_digest_id(&encoded, HRP_NODE).unwrap_err();
        assert!(matches!(err, CodecError::Bech32Prefix { .. }));
    }

    #[test]
    fn rejects_wrong_payload_length() {
        let key = [9u8; KEY_LEN];
        let encoded = encode_key(HRP_USER, &key).expect("encode");
        let err = decode_digest_id(&encoded, HRP_USER).unwrap_err();
        assert!(matches!(err, CodecError::Bech32Length { .. }));
    }
}
