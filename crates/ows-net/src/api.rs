//! The capabilities a node exposes over the peer API, independent of how
//! they're wired to the ledger lock, the gossip dedup FIFO, or disk.
//!
//! [`crate::router::build_api_router`] and [`crate::router::build_gossip_router`]
//! call through this trait rather than touching a `Ledger`/`Resources`
//! pair directly, so the HTTP plumbing here can be exercised against an
//! in-memory fake without the concurrency scaffolding `ows-node` wires up
//! around the real thing.

use async_trait::async_trait;

use crate::error::NetError;

/// Server-side capabilities backing the routes of §4.9.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// `GET /`: the full id chain, oldest first.
    async fn id_chain(&self) -> Result<Vec<String>, NetError>;

    /// `GET /head`: the current head change-set id.
    async fn head(&self) -> Result<String, NetError>;

    /// `GET /<change-set-id>`: that change set's canonical CBOR encoding.
    async fn change_set(&self, id: &str) -> Result<Vec<u8>, NetError>;

    /// `POST /`: validate and append a CBOR-encoded change set.
    async fn submit_change_set(&self, peer: &VerifiedPeer, bytes: Vec<u8>) -> Result<(), NetError>;

    /// `GET /assets`: local asset ids.
    async fn list_assets(&self) -> Result<Vec<String>, NetError>;

    /// `GET /assets/<asset-id>`: that asset's raw bytes.
    async fn asset(&self, id: &str) -> Result<Vec<u8>, NetError>;

    /// `PUT /assets`: store an asset, fanning it out to the `N=3`
    /// closest-by-id node peers when it was uploaded by a user (not
    /// re-fanned-out when a node is the one re-forwarding it).
    async fn upload_asset(&self, peer: &VerifiedPeer, bytes: Vec<u8>) -> Result<String, NetError>;

    /// `PUT /` on the gossip port: a pushed gossip payload. Only node
    /// peers may call this.
    async fn receive_gossip(&self, peer: &VerifiedPeer, bytes: Vec<u8>) -> Result<(), NetError>;
}

/// The verified identity of the peer making a request, as classified by
/// [`ows_identity::PeerRoleClassifier`] after TLS-level acceptance.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedPeer {
    /// The peer's raw Ed25519 public key, extracted from its certificate.
    pub public_key: [u8; 32],
    /// Whether the key is a known node, a known user, or unrecognized.
    pub role: ows_identity::PeerRole,
}
