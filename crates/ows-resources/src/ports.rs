//! Side-effect ports the reconciler drives, kept behind traits so the
//! reconciliation diff itself is testable without a real Docker sandbox,
//! Unix-socket function runtime, or bound TCP listener.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ResourceError;

/// Starts and stops a gateway's HTTP listener.
#[async_trait]
pub trait GatewayRuntime: Send + Sync {
    /// Starts listening for `gateway_id` on `port`.
    async fn start(&self, gateway_id: &str, port: u16) -> Result<(), ResourceError>;
    /// Stops `gateway_id`'s listener, with a graceful drain.
    async fn stop(&self, gateway_id: &str) -> Result<(), ResourceError>;
}

/// Materializes a function's handler asset locally, fetching it from the
/// nearest peer if it isn't already on disk.
#[async_trait]
pub trait FunctionLoader: Send + Sync {
    /// Ensures `asset_id` is present locally.
    async fn ensure_local(&self, asset_id: &str) -> Result<(), ResourceError>;
    /// Drops a no-longer-referenced asset from local storage, if present.
    async fn forget(&self, asset_id: &str);
}

/// The directory of known peer nodes the API client consults for TLS
/// peer checks.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Records or updates a peer's connection info.
    async fn upsert(&self, node_id: &str, address: &str, gossip_port: u16, api_port: u16);
    /// Removes a peer.
    async fn remove(&self, node_id: &str);
}

/// An in-memory [`GatewayRuntime`] double: records start/stop calls
/// instead of binding real sockets.
#[derive(Debug, Default)]
pub struct InMemoryGatewayRuntime {
    listening: Mutex<HashMap<String, u16>>,
}

#[async_trait]
impl GatewayRuntime for InMemoryGatewayRuntime {
    async fn start(&self, gateway_id: &str, port: u16) -> Result<(), ResourceError> {
        self.listening
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(gateway_id.to_string(), port);
        Ok(())
    }

    async fn stop(&self, gateway_id: &str) -> Result<(), ResourceError> {
        self.listening
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(gateway_id);
        Ok(())
    }
}

impl InMemoryGatewayRuntime {
    /// The ports currently believed to be bound.
    #[must_use]
    pub fn listening(&self) -> HashMap<String, u16> {
        self.listening.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

/// An in-memory [`FunctionLoader`] double: every asset is always "local".
#[derive(Debug, Default)]
pub struct InMemoryFunctionLoader {
    local: Mutex<Vec<String>>,
}

#[async_trait]
impl FunctionLoader for InMemoryFunctionLoader {
    async fn ensure_local(&self, asset_id: &str) -> Result<(), ResourceError> {
        let mut local = self.local.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !local.contains(&asset_id.to_string()) {
            local.push(asset_id.to_string());
        }
        Ok(())
    }

    async fn forget(&self, asset_id: &str) {
        self.local
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|id| id != asset_id);
    }
}

impl InMemoryFunctionLoader {
    /// The asset ids currently believed to be local.
    #[must_use]
    pub fn local_assets(&self) -> Vec<String> {
        self.local.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

/// An in-memory [`PeerDirectory`] double.
#[derive(Debug, Default)]
pub struct InMemoryPeerDirectory {
    peers: Mutex<HashMap<String, (String, u16, u16)>>,
}

#[async_trait]
impl PeerDirectory for InMemoryPeerDirectory {
    async fn upsert(&self, node_id: &str, address: &str, gossip_port: u16, api_port: u16) {
        self.peers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(node_id.to_string(), (address.to_string(), gossip_port, api_port));
    }

    async fn remove(&self, node_id: &str) {
        self.peers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(node_id);
    }
}

impl InMemoryPeerDirectory {
    /// The peers currently recorded.
    #[must_use]
    pub fn peers(&self) -> HashMap<String, (String, u16, u16)> {
        self.peers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}
