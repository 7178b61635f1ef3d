//! The state a node's three listeners share.

use std::path::PathBuf;
use std::sync::Arc;

use ows_gossip::GossipDedup;
use ows_identity::KeyPair;
use ows_ledger::Ledger;
use ows_resources::{InMemoryFunctionLoader, InMemoryGatewayRuntime, InMemoryPeerDirectory};
use tokio::sync::{Mutex, RwLock};

use crate::classifier::KeyRoles;
use crate::client::PeerHttp;

/// Everything the API handlers, the gossip forwarder, and the
/// reconciler need, shared across the node's listeners.
///
/// `ledger` is an async `RwLock` (§5: shared single-writer/multi-reader
/// scheme); `dedup` is a separate async `Mutex` per §5's "gossip dedup
/// state lives under a separate fine-grained lock".
pub struct NodeState {
    /// This node's own bech32 id, derived from `key_pair`.
    pub node_id: String,
    /// The project name this node's ledger is stored under.
    pub project: String,
    /// The directory this node persists its key, ledger, and assets in.
    pub data_dir: PathBuf,
    /// This node's signing identity.
    pub key_pair: KeyPair,
    /// The ledger and the snapshot it projects to.
    pub ledger: RwLock<Ledger>,
    /// The recent-gossip dedup window.
    pub dedup: Mutex<GossipDedup>,
    /// Synchronous node/user key lookups for TLS acceptance and HTTP
    /// role classification.
    pub key_roles: Arc<KeyRoles>,
    /// Gateway listener side effects (in-memory double; see DESIGN.md).
    pub gateway_runtime: InMemoryGatewayRuntime,
    /// Function asset materialization side effects (in-memory double).
    pub function_loader: InMemoryFunctionLoader,
    /// The peer directory the API client consults (in-memory double).
    pub peer_directory: InMemoryPeerDirectory,
    /// The outbound mutual-TLS client used for sync, gossip forwarding,
    /// and asset fan-out.
    pub client: PeerHttp,
}

impl NodeState {
    /// Builds a node's shared state around an already-bootstrapped
    /// `ledger`, seeding `key_roles` and the resource doubles from its
    /// current snapshot.
    pub fn new(
        project: String,
        data_dir: PathBuf,
        key_pair: KeyPair,
        ledger: Ledger,
    ) -> Result<Self, ows_identity::IdentityError> {
        let node_id = key_pair.node_id()?;
        let key_roles = Arc::new(KeyRoles::new());
        key_roles.refresh(ledger.snapshot());
        let client = PeerHttp::new(&key_pair, key_roles.clone())
            .map_err(|err| ows_identity::IdentityError::Certificate(err.to_string()))?;

        Ok(Self {
            node_id,
            project,
            data_dir,
            key_pair,
            ledger: RwLock::new(ledger),
            dedup: Mutex::new(GossipDedup::new()),
            key_roles,
            gateway_runtime: InMemoryGatewayRuntime::default(),
            function_loader: InMemoryFunctionLoader::default(),
            peer_directory: InMemoryPeerDirectory::default(),
            client,
        })
    }
}
