//! Error type for codec operations.

use thiserror::Error;

/// Errors that can occur while encoding or decoding ledger wire formats.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The CBOR bytes were structurally invalid.
    #[error("cbor decode error: {0}")]
    Cbor(String),
    /// A CBOR value could not be serialized.
    #[error("cbor encode error: {0}")]
    Encode(String),
    /// The decoded bytes were not the canonical encoding of their value
    /// (non-shortest integer, unsorted map keys, indefinite length, or a tag).
    #[error("non-canonical cbor encoding")]
    NonCanonical,
    /// A CBOR tag was present; tags are not allowed in this wire format.
    #[error("cbor tags are not allowed")]
    TagNotAllowed,
    /// A map contained the same key twice.
    #[error("duplicate map key")]
    DuplicateMapKey,
    /// The value did not have the shape expected for this type.
    #[error("unexpected cbor shape: {0}")]
    Shape(String),
    /// A bech32 string failed to decode.
    #[error("invalid bech32 string {0:?}: {1}")]
    Bech32(String, String),
    /// A bech32 string had an unexpected human-readable prefix.
    #[error("invalid bech32 prefix on {id:?}: expected {expected:?}, got {actual:?}")]
    Bech32Prefix {
        /// The offending id.
        id: String,
        /// The prefix that was expected.
        expected: String,
        /// The prefix that was actually present.
        actual: String,
    },
    /// A bech32 payload had the wrong byte length for its kind.
    #[error("invalid bech32 payload length on {id:?}: expected {expected} bytes, got {actual}")]
    Bech32Length {
        /// The offending id.
        id: String,
        /// The expected payload length in bytes.
        expected: usize,
        /// The actual payload length in bytes.
        actual: usize,
    },
}
