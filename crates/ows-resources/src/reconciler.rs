//! Drives the side effects of a snapshot transition: starting/stopping
//! gateway listeners, materializing function assets, and keeping the
//! peer directory in sync.

use ows_ledger::Snapshot;
use tracing::{info, warn};

use crate::diff::reconcile;
use crate::ports::{FunctionLoader, GatewayRuntime, PeerDirectory};

/// Reconciles `prior` against `new`, driving `gateway_runtime`,
/// `function_loader`, and `peer_directory` for every added, updated, or
/// removed function, gateway, and node. Errors from individual side
/// effects are logged and do not abort the rest of the reconciliation;
/// the snapshot itself is already committed by the time this runs.
pub async fn reconcile_snapshot(
    prior: &Snapshot,
    new: &Snapshot,
    gateway_runtime: &dyn GatewayRuntime,
    function_loader: &dyn FunctionLoader,
    peer_directory: &dyn PeerDirectory,
) {
    let functions = reconcile(&prior.functions, &new.functions);
    for (id, config) in functions.added.iter().chain(&functions.updated) {
        if let Err(err) = function_loader.ensure_local(&config.handler_asset_id).await {
            warn!(function_id = %id, %err, "failed to materialize function asset");
        } else {
            info!(function_id = %id, asset_id = %config.handler_asset_id, "function asset ready");
        }
    }
    for id in &functions.removed {
        if let Some(config) = prior.functions.get(id) {
            function_loader.forget(&config.handler_asset_id).await;
        }
        info!(function_id = %id, "function removed");
    }

    let gateways = reconcile(&prior.gateways, &new.gateways);
    for (id, config) in &gateways.added {
        if let Err(err) = gateway_runtime.start(id, config.port).await {
            warn!(gateway_id = %id, %err, "failed to start gateway listener");
        } else {
            info!(gateway_id = %id, port = config.port, "gateway listening");
        }
    }
    for (id, config) in &gateways.updated {
        if let Err(err) = gateway_runtime.stop(id).await {
            warn!(gateway_id = %id, %err, "failed to stop gateway listener for restart");
        }
        if let Err(err) = gateway_runtime.start(id, config.port).await {
            warn!(gateway_id = %id, %err, "failed to restart gateway listener");
        } else {
            info!(gateway_id = %id, port = config.port, "gateway restarted");
        }
    }
    for id in &gateways.removed {
        if let Err(err) = gateway_runtime.stop(id).await {
            warn!(gateway_id = %id, %err, "failed to stop gateway listener");
        } else {
            info!(gateway_id = %id, "gateway stopped");
        }
    }

    let nodes = reconcile(&prior.nodes, &new.nodes);
    for (id, config) in nodes.added.iter().chain(&nodes.updated) {
        peer_directory.upsert(id, &config.address, config.gossip_port, config.api_port).await;
        info!(node_id = %id, address = %config.address, "peer directory updated");
    }
    for id in &nodes.removed {
        peer_directory.remove(id).await;
        info!(node_id = %id, "peer removed from directory");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use ows_codec::LedgerVersion;
    use ows_ledger::{FunctionConfig, GatewayConfig, NodeConfig};

    use super::*;
    use crate::ports::{InMemoryFunctionLoader, InMemoryGatewayRuntime, InMemoryPeerDirectory};

    #[tokio::test]
    async fn added_gateway_starts_a_listener() {
        let prior = Snapshot::new(LedgerVersion::CURRENT);
        let mut new = Snapshot::new(LedgerVersion::CURRENT);
        new.gateways
            .insert("gateway1a".to_string(), GatewayConfig { port: 8080, endpoints: Vec::new() });

        let runtime = InMemoryGatewayRuntime::default();
        let loader = InMemoryFunctionLoader::default();
        let directory = InMemoryPeerDirectory::default();
        reconcile_snapshot(&prior, &new, &runtime, &loader, &directory).await;

        assert_eq!(runtime.listening().get("gateway1a"), Some(&8080));
    }

    #[tokio::test]
    async fn removed_node_drops_from_peer_directory() {
        let mut prior = Snapshot::new(LedgerVersion::CURRENT);
        prior.nodes.insert(
            "node1a".to_string(),
            NodeConfig { pub_key: [1u8; 32], address: "10.0.0.1".to_string(), gossip_port: 4000, api_port: 4001 },
        );
        let new = Snapshot::new(LedgerVersion::CURRENT);

        let runtime = InMemoryGatewayRuntime::default();
        let loader = InMemoryFunctionLoader::default();
        let directory = InMemoryPeerDirectory::default();
        directory.upsert("node1a", "10.0.0.1", 4000, 4001).await;

        reconcile_snapshot(&prior, &new, &runtime, &loader, &directory).await;
        assert!(directory.peers().is_empty());
    }

    #[tokio::test]
    async fn added_function_materializes_its_asset() {
        let prior = Snapshot::new(LedgerVersion::CURRENT);
        let mut new = Snapshot::new(LedgerVersion::CURRENT);
        new.functions.insert(
            "fn1a".to_string(),
            FunctionConfig { runtime: "nodejs".to_string(), handler_asset_id: "asset1a".to_string() },
        );

        let runtime = InMemoryGatewayRuntime::default();
        let loader = InMemoryFunctionLoader::default();
        let directory = InMemoryPeerDirectory::default();
        reconcile_snapshot(&prior, &new, &runtime, &loader, &directory).await;

        assert_eq!(loader.local_assets(), vec!["asset1a".to_string()]);
    }
}
