//! The node's [`NodeApi`] implementation: the ledger lock, the dedup
//! window, and the resource doubles wired to the peer API's route table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ows_codec::{blake2b128, decode_raw, encode_digest_id, HRP_ASSET};
use ows_gossip::{receive, ReceiveOutcome};
use ows_identity::PeerRole;
use ows_ledger::{store, ChangeSet, NodeConfig};
use ows_net::{NetError, NodeApi, VerifiedPeer};
use ows_resources::reconcile_snapshot;
use tracing::warn;

use crate::gossip;
use crate::state::NodeState;

/// How many of the closest-by-id node peers a user-uploaded asset is
/// fanned out to (§4.9).
const ASSET_FANOUT: usize = 3;

/// Implements the peer API's server-side capabilities against a shared
/// [`NodeState`].
pub struct NodeApiImpl {
    state: Arc<NodeState>,
}

impl NodeApiImpl {
    /// Wraps `state`.
    #[must_use]
    pub fn new(state: Arc<NodeState>) -> Self {
        Self { state }
    }
}

fn closest_nodes_to<'a>(
    target_id: &str,
    nodes: &'a HashMap<String, NodeConfig>,
    count: usize,
) -> Vec<(&'a String, &'a NodeConfig)> {
    let Ok((_, target_payload)) = decode_raw(target_id) else {
        return Vec::new();
    };
    let mut scored: Vec<(u32, &String, &NodeConfig)> = nodes
        .iter()
        .filter_map(|(id, cfg)| {
            let (_, payload) = decode_raw(id).ok()?;
            let distance = target_payload
                .iter()
                .zip(payload.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum();
            Some((distance, id, cfg))
        })
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored.truncate(count);
    scored.into_iter().map(|(_, id, cfg)| (id, cfg)).collect()
}

#[async_trait]
impl NodeApi for NodeApiImpl {
    async fn id_chain(&self) -> Result<Vec<String>, NetError> {
        Ok(self.state.ledger.read().await.id_chain()?)
    }

    async fn head(&self) -> Result<String, NetError> {
        Ok(self.state.ledger.read().await.head().to_string())
    }

    async fn change_set(&self, id: &str) -> Result<Vec<u8>, NetError> {
        let ledger = self.state.ledger.read().await;
        for cs in ledger.change_sets() {
            if cs.id()? == id {
                return Ok(cs.encode()?);
            }
        }
        Err(NetError::NotFound(id.to_string()))
    }

    async fn submit_change_set(&self, _peer: &VerifiedPeer, bytes: Vec<u8>) -> Result<(), NetError> {
        let version = self.state.ledger.read().await.version().get();
        let cs = ChangeSet::decode(&bytes, version)?;

        let (prior_snapshot, new_snapshot) = {
            let mut ledger = self.state.ledger.write().await;
            let prior_snapshot = ledger.snapshot().clone();
            ledger.append(cs.clone())?;
            store::save_project_ledger(&self.state.data_dir, &self.state.project, &ledger)?;
            self.state.key_roles.refresh(ledger.snapshot());
            (prior_snapshot, ledger.snapshot().clone())
        };

        reconcile_snapshot(
            &prior_snapshot,
            &new_snapshot,
            &self.state.gateway_runtime,
            &self.state.function_loader,
            &self.state.peer_directory,
        )
        .await;
        gossip::originate(&self.state, cs).await;
        Ok(())
    }

    async fn list_assets(&self) -> Result<Vec<String>, NetError> {
        Ok(store::list_assets(&self.state.data_dir)?)
    }

    async fn asset(&self, id: &str) -> Result<Vec<u8>, NetError> {
        Ok(store::load_asset(&self.state.data_dir, id)?)
    }

    async fn upload_asset(&self, peer: &VerifiedPeer, bytes: Vec<u8>) -> Result<String, NetError> {
        let digest = blake2b128(&bytes);
        let asset_id = encode_digest_id(HRP_ASSET, &digest)
            .map_err(|err| NetError::BadRequest(err.to_string()))?;
        store::save_asset(&self.state.data_dir, &asset_id, &bytes)?;

        // Only a user's upload gets fanned out; a node re-forwarding an
        // asset on a peer's behalf must not trigger another fan-out
        // round, or a single upload would propagate without bound.
        if !matches!(peer.role, PeerRole::Node) {
            let targets: Vec<String> = {
                let ledger = self.state.ledger.read().await;
                closest_nodes_to(&asset_id, &ledger.snapshot().nodes, ASSET_FANOUT)
                    .into_iter()
                    .filter(|(id, _)| id.as_str() != self.state.node_id)
                    .map(|(_, cfg)| format!("https://{}:{}", cfg.address, cfg.api_port))
                    .collect()
            };
            for target in targets {
                let client = self.state.client.clone();
                let bytes = bytes.clone();
                tokio::spawn(async move {
                    if let Err(err) = client.upload_asset(&target, bytes).await {
                        warn!(%target, %err, "asset fan-out failed");
                    }
                });
            }
        }

        Ok(asset_id)
    }

    async fn receive_gossip(&self, _peer: &VerifiedPeer, bytes: Vec<u8>) -> Result<(), NetError> {
        let version = self.state.ledger.read().await.version().get();

        let (outcome, sender_node_id) = {
            let mut ledger = self.state.ledger.write().await;
            let mut dedup = self.state.dedup.lock().await;
            let prior_snapshot = ledger.snapshot().clone();
            let gossip_node_id = ows_gossip::Gossip::decode(&bytes, version)
                .map(|g| g.node_id)
                .unwrap_or_default();
            let outcome = receive(&mut ledger, &mut dedup, &bytes, version)
                .map_err(|err| NetError::BadRequest(err.to_string()))?;
            if matches!(outcome, ReceiveOutcome::Applied) {
                store::save_project_ledger(&self.state.data_dir, &self.state.project, &ledger)?;
                self.state.key_roles.refresh(ledger.snapshot());
                let new_snapshot = ledger.snapshot().clone();
                drop(ledger);
                drop(dedup);
                reconcile_snapshot(
                    &prior_snapshot,
                    &new_snapshot,
                    &self.state.gateway_runtime,
                    &self.state.function_loader,
                    &self.state.peer_directory,
                )
                .await;
            }
            (outcome, gossip_node_id)
        };

        if outcome.should_forward() {
            gossip::push_to_neighbours(&self.state, bytes).await;
        }
        if matches!(outcome, ReceiveOutcome::PullSyncRequired) && !sender_node_id.is_empty() {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                gossip::pull_sync_from(&state, &sender_node_id).await;
            });
        }

        Ok(())
    }
}
