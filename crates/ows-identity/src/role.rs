//! Peer role classification.
//!
//! TLS-level verification only decides whether to accept a connection at
//! all (see [`crate::verifier`]); once accepted, request handlers still
//! need to know *which kind* of peer they're talking to so they can apply
//! the right authorization rules. [`PeerRoleClassifier`] lets a caller
//! (typically something backed by the current snapshot) answer that
//! question for an already-verified public key.

/// The role a verified peer plays, as seen by the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// The peer's key belongs to a known node (gossip/sync traffic).
    Node,
    /// The peer's key belongs to a known user (change-set submission).
    User,
    /// The key was accepted at the TLS layer but is not a known node or
    /// user (for example, a brand new user submitting their first
    /// change set, which must add themselves).
    Unknown,
}

/// Classifies an already-verified peer's public key into a [`PeerRole`].
pub trait PeerRoleClassifier: Send + Sync {
    /// Returns the role the given public key plays in the current
    /// snapshot.
    fn classify(&self, public_key: &[u8; 32]) -> PeerRole;
}
