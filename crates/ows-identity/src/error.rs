//! Error type for identity operations.

use thiserror::Error;

/// Errors that can occur while handling keys, signatures, or peer
/// certificates.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A backup phrase did not have exactly 24 words.
    #[error("expected a 24-word phrase, got {0} words")]
    WrongWordCount(usize),
    /// A backup phrase failed BIP-39 validation (bad checksum or word).
    #[error("invalid backup phrase: {0}")]
    InvalidPhrase(String),
    /// A raw key string was not valid hex or had the wrong length.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),
    /// An Ed25519 signature failed to verify.
    #[error("signature verification failed")]
    InvalidSignature,
    /// Certificate generation failed.
    #[error("certificate generation failed: {0}")]
    Certificate(String),
    /// The peer's certificate could not be parsed or did not embed a
    /// usable Ed25519 public key.
    #[error("invalid peer certificate: {0}")]
    InvalidPeerCertificate(String),
    /// The peer's public key did not pass the caller-supplied
    /// authorization predicate.
    #[error("peer rejected: not a recognized node or user key")]
    PeerNotAuthorized,
}
