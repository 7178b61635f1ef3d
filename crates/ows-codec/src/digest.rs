//! Blake2b-128 content digests.
//!
//! The ledger hashes bytes, never structured values, so a digest is always
//! taken over a canonical CBOR encoding produced by [`crate::canonical`].

use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};

/// Byte length of a short digest (128 bits).
pub const SHORT_DIGEST_LEN: usize = 16;

type Blake2b128 = Blake2b<U16>;

/// Computes the Blake2b-128 digest of `bytes`.
#[must_use]
pub fn blake2b128(bytes: &[u8]) -> [u8; SHORT_DIGEST_LEN] {
    let mut hasher = Blake2b128::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut digest = [0u8; SHORT_DIGEST_LEN];
    digest.copy_from_slice(&out);
    digest
}

/// Computes the Blake2b-128 digest of the concatenation of `parts`, without
/// allocating an intermediate buffer.
#[must_use]
pub fn blake2b128_concat(parts: &[&[u8]]) -> [u8; SHORT_DIGEST_LEN] {
    let mut hasher = Blake2b128::new();
    for part in parts {
        hasher.update(part);
    }
    let out = hasher.finalize();
    let mut digest = [0u8; SHORT_DIGEST_LEN];
    digest.copy_from_slice(&out);
    digest
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(blake2b128(b"hello"), blake2b128(b"hello"));
    }

    #[test]
    fn digest_is_16_bytes() {
        assert_eq!(blake2b128(b"hello").len(), SHORT_DIGEST_LEN);
    }

    #[test]
    fn concat_matches_manual_concatenation() {
        let mut combined = Vec::new();
        combined.extend_from_slice(b"foo");
        combined.extend_from_slice(b"bar");
        assert_eq!(blake2b128(&combined), blake2b128_concat(&[b"foo", b"bar"]));
    }

    #[test]
    fn distinct_inputs_produce_distinct_digests() {
        assert_ne!(blake2b128(b"a"), blake2b128(b"b"));
    }
}
