//! The abstract peer a node syncs against.

use async_trait::async_trait;
use ows_ledger::ChangeSet;

use crate::error::SyncError;

/// The subset of a peer node's TLS API the sync algorithm needs. Kept
/// abstract so §4.7's algorithm is testable against an in-memory fake
/// without standing up real mutual-TLS listeners; `ows-node` supplies the
/// `reqwest`-backed implementation.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetches the peer's current head change-set id.
    async fn head(&self) -> Result<String, SyncError>;

    /// Fetches the peer's full id chain, oldest first.
    async fn id_chain(&self) -> Result<Vec<String>, SyncError>;

    /// Fetches one change set by id.
    async fn change_set(&self, id: &str) -> Result<ChangeSet, SyncError>;
}
