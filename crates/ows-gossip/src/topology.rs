//! The deterministic "one-to-closest" gossip overlay.
//!
//! Every node computes the same routing table independently, from nothing
//! but the current node-id set and a fixed starting point: there is no
//! negotiation and no shared state beyond the ledger's node list.

use std::collections::{HashMap, HashSet, VecDeque};

use ows_codec::{decode_digest_id, HRP_NODE};

use crate::error::GossipError;

/// Closest-candidates fan-out per hop.
const K: usize = 10;
/// Maximum number of inbound edges a single node may be assigned.
const R: usize = 3;

/// Hamming distance between the 16-byte digest payloads of two node ids.
pub fn distance(a: &str, b: &str) -> Result<u32, GossipError> {
    let da = decode_digest_id(a, HRP_NODE).map_err(|err| GossipError::Decode(err.to_string()))?;
    let db = decode_digest_id(b, HRP_NODE).map_err(|err| GossipError::Decode(err.to_string()))?;
    Ok(da.iter().zip(db.iter()).map(|(x, y)| (x ^ y).count_ones()).sum())
}

/// Computes the forwarding table for a gossip wave starting at `init`.
///
/// Performs a breadth-first walk over `all_nodes` (excluding `init`),
/// expanding each visited node to its `K` closest not-yet-saturated
/// neighbours by Hamming distance (ties broken lexicographically by id),
/// capping every node's inbound edge count at `R`. The result maps each
/// node id that was assigned at least one recipient to the ordered list
/// of node ids it should forward to.
pub fn one_to_closest<'a>(
    init: &'a str,
    all_nodes: &'a [String],
) -> Result<HashMap<String, Vec<String>>, GossipError> {
    // `remaining`/`inbound_count`/`visited` all borrow from `all_nodes`,
    // which outlives the whole function body, so these borrows never
    // conflict with moving owned `String`s into the returned table.
    let mut remaining: Vec<&'a String> =
        all_nodes.iter().filter(|n| n.as_str() != init).collect();
    let mut inbound_count: HashMap<&'a str, usize> = HashMap::new();
    let mut table: HashMap<String, Vec<String>> = HashMap::new();
    let mut visited: HashSet<&'a str> = HashSet::new();
    let mut frontier: VecDeque<&'a str> = VecDeque::new();
    frontier.push_back(init);
    visited.insert(init);

    while let Some(current) = frontier.pop_front() {
        if remaining.is_empty() {
            break;
        }
        let mut candidates = remaining
            .iter()
            .filter(|n| *inbound_count.get(n.as_str()).unwrap_or(&0) < R)
            .map(|n| distance(current, n).map(|d| (d, *n)))
            .collect::<Result<Vec<_>, _>>()?;
        candidates.sort_by(|(da, ia), (db, ib)| da.cmp(db).then_with(|| ia.cmp(ib)));
        candidates.truncate(K);

        if candidates.is_empty() {
            continue;
        }
        let chosen: Vec<&'a String> = candidates.into_iter().map(|(_, id)| id).collect();
        for id in &chosen {
            *inbound_count.entry(id.as_str()).or_insert(0) += 1;
            if visited.insert(id.as_str()) {
                frontier.push_back(id.as_str());
            }
        }
        remaining.retain(|n| !chosen.contains(n));
        table.insert(current.to_string(), chosen.into_iter().cloned().collect());
    }

    Ok(table)
}
