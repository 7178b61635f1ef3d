//! Error type for ledger operations.

use thiserror::Error;

/// Errors that can occur while decoding, validating, or mutating a ledger
/// or its snapshot.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The bytes did not decode into the expected wire shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// A change set's `prev` field did not reference an entry decodable as
    /// a change-set id.
    #[error("codec error: {0}")]
    Codec(#[from] ows_codec::CodecError),
    /// A signature over a change set failed to verify.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),
    /// A change set's `prev` did not match the snapshot's current head.
    #[error("invalid prev change-set id: expected {expected}, got {actual}")]
    PrevMismatch {
        /// The snapshot's current head id.
        expected: String,
        /// The `prev` id actually found on the change set.
        actual: String,
    },
    /// None of a change set's signers' policies authorized one of its
    /// actions.
    #[error("unauthorized: no policy allows {category}:{name}")]
    Unauthorized {
        /// The action's category.
        category: String,
        /// The action's name.
        name: String,
    },
    /// A snapshot mutator's precondition was violated (duplicate id,
    /// missing reference, port collision, and so on).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// An action or ledger version had no registered decoder.
    #[error("no decoder for {category}:{name} at version {version}")]
    NoDecoder {
        /// The action's category.
        category: String,
        /// The action's name.
        name: String,
        /// The ledger version that was being decoded.
        version: u64,
    },
    /// The requested resource (asset, change set) does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A filesystem operation failed.
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}
