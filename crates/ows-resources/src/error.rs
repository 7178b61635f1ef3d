//! Error type for resource reconciliation.

use thiserror::Error;

/// Errors that can occur while reconciling live resources against a new
/// snapshot.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A function's handler asset could not be fetched from any peer.
    #[error("could not materialize asset {asset_id}: {reason}")]
    AssetUnavailable {
        /// The asset id that could not be fetched.
        asset_id: String,
        /// Why the fetch failed.
        reason: String,
    },
    /// Starting or stopping a gateway's HTTP listener failed.
    #[error("gateway {gateway_id} listener failed: {reason}")]
    ListenerFailed {
        /// The gateway whose listener failed.
        gateway_id: String,
        /// Why the listener operation failed.
        reason: String,
    },
}
