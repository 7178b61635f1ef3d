//! Gossip origination, forwarding, and the pull-sync fallback for a
//! gossip wave this node could not bridge locally.

use std::sync::Arc;

use ows_gossip::{one_to_closest, Gossip};
use ows_ledger::{store, ChangeSet, NodeConfig};
use ows_resources::reconcile_snapshot;
use tracing::warn;

use crate::client::SyncTarget;
use crate::state::NodeState;

fn base_url(address: &str, port: u16) -> String {
    format!("https://{address}:{port}")
}

/// Announces a freshly appended change set to this node's overlay
/// neighbours.
pub async fn originate(state: &Arc<NodeState>, cs: ChangeSet) {
    let head = match cs.id() {
        Ok(id) => id,
        Err(err) => {
            warn!(%err, "failed to compute change-set id for gossip origination");
            return;
        }
    };
    let gossip = Gossip { node_id: state.node_id.clone(), head, changes: vec![cs] };
    let Ok(raw) = gossip.encode() else {
        warn!("failed to encode gossip payload; dropping origination");
        return;
    };
    push_to_neighbours(state, raw).await;
}

/// Forwards a raw gossip payload to this node's current one-to-closest
/// neighbours. The overlay is recomputed fresh from the current snapshot
/// every time (rather than cached), so a node admitted or evicted since
/// the last wave is reflected on the very next one.
///
/// Per §5, the node table is read and released before any network I/O;
/// each forward then runs as its own detached task so one slow or
/// unreachable neighbour cannot delay the others.
pub async fn push_to_neighbours(state: &Arc<NodeState>, raw_bytes: Vec<u8>) {
    let targets: Vec<String> = {
        let ledger = state.ledger.read().await;
        let snapshot = ledger.snapshot();
        let all_nodes: Vec<String> = snapshot.nodes.keys().cloned().collect();
        let table = match one_to_closest(&state.node_id, &all_nodes) {
            Ok(table) => table,
            Err(err) => {
                warn!(%err, "failed to compute gossip overlay");
                return;
            }
        };
        table
            .get(state.node_id.as_str())
            .into_iter()
            .flatten()
            .filter_map(|node_id| snapshot.nodes.get(node_id))
            .map(|cfg: &NodeConfig| base_url(&cfg.address, cfg.gossip_port))
            .collect()
    };

    for target in targets {
        let state = Arc::clone(state);
        let raw = raw_bytes.clone();
        tokio::spawn(async move {
            if let Err(err) = state.client.push_gossip(&target, raw).await {
                warn!(%target, %err, "gossip forward failed");
            }
        });
    }
}

/// Pull-syncs against the node that sent a gossip payload this node
/// could not bridge by sequential append (`ReceiveOutcome::PullSyncRequired`).
///
/// Runs the fetch-and-append sequence against a private clone of the
/// ledger, off the shared lock, then swaps the result in — the same
/// "snapshot under lock, release, do I/O, re-acquire to apply" shape
/// §5 asks of the sync loop. A local append racing with this swap is
/// lost, which matches §5's documented limitation for concurrent
/// writers; the loser simply gets rejected by the peer at its next
/// submission and resubmits.
pub async fn pull_sync_from(state: &Arc<NodeState>, sender_node_id: &str) {
    let (target_url, mut working) = {
        let ledger = state.ledger.read().await;
        let Some(cfg) = ledger.snapshot().nodes.get(sender_node_id) else {
            warn!(node_id = %sender_node_id, "gossip sender is not a known node; cannot pull sync");
            return;
        };
        (base_url(&cfg.address, cfg.api_port), ledger.clone())
    };

    let target = SyncTarget::new(&state.client, target_url.clone());
    if let Err(err) = ows_sync::sync(&mut working, &target).await {
        warn!(base_url = %target_url, %err, "pull sync after unresolvable gossip failed");
        return;
    }

    if let Err(err) = store::save_project_ledger(&state.data_dir, &state.project, &working) {
        warn!(%err, "failed to persist ledger after pull sync");
        return;
    }

    let mut ledger = state.ledger.write().await;
    let prior_snapshot = ledger.snapshot().clone();
    *ledger = working;
    state.key_roles.refresh(ledger.snapshot());
    reconcile_snapshot(
        &prior_snapshot,
        ledger.snapshot(),
        &state.gateway_runtime,
        &state.function_loader,
        &state.peer_directory,
    )
    .await;
}
