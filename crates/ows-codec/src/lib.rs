//! Canonical CBOR encoding, bech32 ids, and content digests for the OWS
//! ledger.
//!
//! Every other crate in the workspace depends on this one for the wire
//! primitives that must be byte-identical across nodes: a change set's id
//! and signature are taken over exactly the bytes this crate produces, so
//! `encode` is the single place that decides what "the bytes" are.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod bech32;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod varint;
pub mod version;

pub use bech32::{
    decode_digest_id, decode_key, decode_raw, encode, encode_digest_id, encode_key, DIGEST_LEN,
    HRP_ASSET, HRP_CHANGES, HRP_FN, HRP_GATEWAY, HRP_NODE, HRP_POLICY, HRP_PROJECT, HRP_USER,
    KEY_LEN,
};
pub use digest::{blake2b128, blake2b128_concat, SHORT_DIGEST_LEN};
pub use error::CodecError;
pub use varint::encode_action_index;
pub use version::LedgerVersion;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn resource_id_derivation_is_deterministic() {
        let prev_bytes = b"previous-change-set-bytes";
        let index = encode_action_index(3);
        let digest = blake2b128_concat(&[prev_bytes, &index]);
        let id = encode_digest_id(HRP_FN, &digest).expect("encode id");
        assert_eq!(
            digest,
            decode_digest_id(&id, HRP_FN).expect("decode id"),
            "round trip through bech32 must preserve the digest"
        );
    }
}
