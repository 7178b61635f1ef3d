//! Synchronous peer-key lookups backed by a cache kept in step with the
//! ledger's snapshot.
//!
//! [`ows_identity::PeerRoleClassifier::classify`] and
//! [`ows_identity::PeerPredicate::is_valid_peer`] are both plain
//! synchronous trait methods: one is called from axum middleware, the
//! other from inside a `rustls` certificate verifier. Neither call site
//! can await the node's `tokio::sync::RwLock<Ledger>`, so [`KeyRoles`]
//! keeps its own `std::sync::RwLock`-guarded copy of "which key plays
//! which role", refreshed every time the ledger's snapshot changes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ows_identity::{PeerPredicate, PeerRole, PeerRoleClassifier};
use ows_ledger::Snapshot;

/// A point-in-time map from raw Ed25519 public key to the role it plays
/// in the current snapshot, refreshed by [`KeyRoles::refresh`].
#[derive(Debug, Default)]
pub struct KeyRoles {
    roles: RwLock<HashMap<[u8; 32], PeerRole>>,
}

impl KeyRoles {
    /// Builds an empty cache; call [`KeyRoles::refresh`] before relying
    /// on it to classify anyone as a known node or user.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the cache from `snapshot`'s current nodes and users. A
    /// key present in both maps (which the ledger's invariants should
    /// never produce) is reported as a node.
    pub fn refresh(&self, snapshot: &Snapshot) {
        let mut roles = HashMap::with_capacity(snapshot.nodes.len() + snapshot.users.len());
        for user in snapshot.users.values() {
            roles.insert(user.pub_key, PeerRole::User);
        }
        for node in snapshot.nodes.values() {
            roles.insert(node.pub_key, PeerRole::Node);
        }
        let mut guard = self.roles.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = roles;
    }
}

impl PeerRoleClassifier for KeyRoles {
    fn classify(&self, public_key: &[u8; 32]) -> PeerRole {
        self.roles
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(public_key)
            .copied()
            .unwrap_or(PeerRole::Unknown)
    }
}

impl PeerPredicate for KeyRoles {
    /// A peer is valid to connect to outbound only if it is a known
    /// node; the node never initiates a connection to a mere user.
    fn is_valid_peer(&self, public_key: &[u8; 32]) -> bool {
        matches!(self.classify(public_key), PeerRole::Node)
    }
}

impl PeerRoleClassifier for Arc<KeyRoles> {
    fn classify(&self, public_key: &[u8; 32]) -> PeerRole {
        self.as_ref().classify(public_key)
    }
}

impl PeerPredicate for Arc<KeyRoles> {
    fn is_valid_peer(&self, public_key: &[u8; 32]) -> bool {
        self.as_ref().is_valid_peer(public_key)
    }
}

/// Accepts any syntactically valid Ed25519 peer certificate at the TLS
/// layer. A node's listeners have no allowlist of their own: a brand new
/// user has to complete a handshake before it can submit the very
/// `AddUser` change set that registers it. Role-based authorization
/// happens afterward, in the HTTP layer, via [`KeyRoles`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyPeer;

impl PeerPredicate for AcceptAnyPeer {
    fn is_valid_peer(&self, _public_key: &[u8; 32]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use ows_codec::LedgerVersion;
    use ows_ledger::{NodeConfig, UserConfig};

    use super::*;

    #[test]
    fn unknown_key_classifies_as_unknown() {
        let roles = KeyRoles::new();
        assert_eq!(roles.classify(&[1u8; 32]), PeerRole::Unknown);
        assert!(!roles.is_valid_peer(&[1u8; 32]));
    }

    #[test]
    fn refresh_picks_up_nodes_and_users() {
        let roles = KeyRoles::new();
        let mut snapshot = Snapshot::new(LedgerVersion::CURRENT);
        snapshot.nodes.insert(
            "node1a".to_string(),
            NodeConfig { pub_key: [2u8; 32], address: "10.0.0.1".to_string(), gossip_port: 4000, api_port: 4001 },
        );
        snapshot.users.insert(
            "user1a".to_string(),
            UserConfig { pub_key: [3u8; 32], is_root: false, policies: Vec::new() },
        );
        roles.refresh(&snapshot);

        assert_eq!(roles.classify(&[2u8; 32]), PeerRole::Node);
        assert!(roles.is_valid_peer(&[2u8; 32]));
        assert_eq!(roles.classify(&[3u8; 32]), PeerRole::User);
        assert!(!roles.is_valid_peer(&[3u8; 32]));
    }

    #[test]
    fn accept_any_peer_always_accepts() {
        assert!(AcceptAnyPeer.is_valid_peer(&[9u8; 32]));
    }
}
