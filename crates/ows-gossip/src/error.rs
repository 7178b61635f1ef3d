//! Error type for the gossip protocol.

use thiserror::Error;

/// Errors that can occur while encoding, decoding, or applying gossip.
#[derive(Debug, Error)]
pub enum GossipError {
    /// The gossip payload did not decode to the expected wire shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// A codec-level failure (canonical CBOR violation).
    #[error("codec error: {0}")]
    Codec(#[from] ows_codec::CodecError),
    /// Applying a gossip's change sets to the local ledger failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] ows_ledger::LedgerError),
}
