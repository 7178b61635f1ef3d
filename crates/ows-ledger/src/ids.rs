//! Deterministic resource-id derivation.
//!
//! Every creation action except `AddNode`/`AddUser` gets its resource id
//! from `bech32(prefix, blake2b128(prev_bytes || le_index))`, where
//! `prev_bytes` is the *payload* of the containing change set's `prev` id
//! (empty for the initial configuration) and `le_index` is the action's
//! zero-based index within the change set, little-endian encoded. Node and
//! user ids skip this scheme entirely: they are derived directly from the
//! subject's public key, so the same key always maps to the same id.

use ows_codec::{blake2b128_concat, decode_digest_id, encode_action_index, encode_digest_id, HRP_CHANGES};

use crate::error::LedgerError;

/// Decodes a change-set id into its raw digest payload, or an empty vector
/// for the sentinel empty `prev` of the initial configuration.
pub fn prev_bytes(prev_id: &str) -> Result<Vec<u8>, LedgerError> {
    if prev_id.is_empty() {
        return Ok(Vec::new());
    }
    let digest = decode_digest_id(prev_id, HRP_CHANGES)?;
    Ok(digest.to_vec())
}

/// Derives the resource id for the `index`-th action of a change set whose
/// `prev` id is `prev_id`, under the given resource-kind `prefix`.
pub fn generate_resource_id(prefix: &str, prev_id: &str, index: u64) -> Result<String, LedgerError> {
    let prev = prev_bytes(prev_id)?;
    let index_bytes = encode_action_index(index);
    let digest = blake2b128_concat(&[&prev, &index_bytes]);
    Ok(encode_digest_id(prefix, &digest)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use ows_codec::HRP_FN;

    #[test]
    fn initial_configuration_uses_empty_prev_bytes() {
        assert_eq!(prev_bytes("").expect("empty prev"), Vec::<u8>::new());
    }

    #[test]
    fn same_inputs_produce_same_id() {
        let a = generate_resource_id(HRP_FN, "", 0).expect("id a");
        let b = generate_resource_id(HRP_FN, "", 0).expect("id b");
        assert_eq!(a, b);
    }

    #[test]
    fn different_indices_produce_different_ids() {
        let a = generate_resource_id(HRP_FN, "", 0).expect("id a");
        let b = generate_resource_id(HRP_FN, "", 1).expect("id b");
        assert_ne!(a, b);
    }
}
