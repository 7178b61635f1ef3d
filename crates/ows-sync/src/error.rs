//! Error type for the pull-sync protocol.

use thiserror::Error;

/// Errors that can occur while syncing a ledger against a peer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The ledger rejected a fetched change set, or a local ledger
    /// operation (`intersect`, `keep`, `append`) failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] ows_ledger::LedgerError),
    /// The peer client failed to fetch some piece of remote state
    /// (network failure, malformed response, peer unreachable).
    #[error("peer transport error: {0}")]
    Transport(String),
    /// The peer claimed a change set existed at a given id but served
    /// bytes that decode to a change set with a different id.
    #[error("peer served change set {served} when {expected} was requested")]
    MismatchedChangeSet {
        /// The id that was requested.
        expected: String,
        /// The id the served bytes actually decode to.
        served: String,
    },
}
