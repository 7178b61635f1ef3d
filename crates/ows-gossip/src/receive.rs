//! Receiving a pushed gossip payload and deciding whether/how to forward it.

use ows_ledger::Ledger;

use crate::dedup::GossipDedup;
use crate::error::GossipError;
use crate::message::Gossip;

/// What a node should do after receiving a raw gossip payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The payload's digest was already in the dedup window; dropped
    /// without being decoded, applied, or forwarded.
    Duplicate,
    /// The announced head matched the local head already; dropped
    /// without being forwarded.
    AlreadyCurrent,
    /// The carried change sets were appended and the local ledger now
    /// matches the announced head; the caller should forward the raw
    /// bytes on to this node's overlay neighbours.
    Applied,
    /// The carried change sets did not bridge the gap between the local
    /// head and the announced head (the common ancestor was missing or
    /// stale); the caller should fall back to pull sync against the
    /// sender, and should still forward the raw bytes on.
    PullSyncRequired,
}

impl ReceiveOutcome {
    /// Whether the caller should forward the raw gossip bytes to this
    /// node's overlay neighbours.
    #[must_use]
    pub fn should_forward(self) -> bool {
        matches!(self, Self::Applied | Self::PullSyncRequired)
    }
}

/// Processes a raw pushed gossip payload against the local `ledger`.
///
/// 1. Dedup on the raw bytes; duplicates are dropped without decoding.
/// 2. Decode and compare the announced head to the local head; already
///    current is dropped too.
/// 3. Locate the carried change set whose `prev` equals the local head
///    and append everything from there through the announced head, in
///    order. Any append failure, or no such anchor existing at all,
///    means the gap cannot be bridged locally and pull sync is needed.
pub fn receive(
    ledger: &mut Ledger,
    dedup: &mut GossipDedup,
    raw_bytes: &[u8],
    version: u64,
) -> Result<ReceiveOutcome, GossipError> {
    if !dedup.insert_if_new(raw_bytes) {
        return Ok(ReceiveOutcome::Duplicate);
    }

    let gossip = Gossip::decode(raw_bytes, version)?;
    let local_head = ledger.head().to_string();
    if local_head == gossip.head {
        return Ok(ReceiveOutcome::AlreadyCurrent);
    }

    let anchor = gossip.changes.iter().position(|cs| cs.prev == local_head);
    let Some(start) = anchor else {
        return Ok(ReceiveOutcome::PullSyncRequired);
    };

    let mut applied = ledger.clone();
    for cs in &gossip.changes[start..] {
        if applied.append(cs.clone()).is_err() {
            return Ok(ReceiveOutcome::PullSyncRequired);
        }
    }
    if applied.head() != gossip.head {
        return Ok(ReceiveOutcome::PullSyncRequired);
    }

    *ledger = applied;
    Ok(ReceiveOutcome::Applied)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use ows_codec::LedgerVersion;
    use ows_identity::KeyPair;
    use ows_ledger::{Action, ChangeSet};

    use super::*;

    fn signed(prev: &str, key_pair: &KeyPair, action: Action) -> ChangeSet {
        let mut cs = ChangeSet::new(prev.to_string(), vec![action]);
        cs.sign(key_pair).expect("sign");
        cs
    }

    fn bootstrap() -> (Ledger, KeyPair) {
        let key_pair = KeyPair::from_seed([3u8; 32]);
        let cs = signed("", &key_pair, Action::AddUser { pub_key: key_pair.public_key_bytes() });
        let ledger = Ledger::build(LedgerVersion::new(1), vec![cs]).expect("bootstrap");
        (ledger, key_pair)
    }

    #[test]
    fn duplicate_raw_bytes_are_dropped_without_decoding() {
        let (mut ledger, key_pair) = bootstrap();
        let head = ledger.head().to_string();
        let cs = signed(&head, &key_pair, Action::AddUser { pub_key: [9u8; 32] });
        let gossip =
            Gossip { node_id: key_pair.node_id().expect("node id"), head: cs.id().expect("id"), changes: vec![cs] };
        let raw = gossip.encode().expect("encode");

        let mut dedup = GossipDedup::new();
        assert_eq!(receive(&mut ledger, &mut dedup, &raw, 1).expect("first"), ReceiveOutcome::Applied);
        let head_after_first = ledger.head().to_string();
        assert_eq!(receive(&mut ledger, &mut dedup, &raw, 1).expect("second"), ReceiveOutcome::Duplicate);
        assert_eq!(ledger.head(), head_after_first);
    }

    #[test]
    fn gossip_announcing_the_current_head_is_a_no_op() {
        let (mut ledger, key_pair) = bootstrap();
        let head = ledger.head().to_string();
        let gossip = Gossip { node_id: key_pair.node_id().expect("node id"), head: head.clone(), changes: vec![] };
        let raw = gossip.encode().expect("encode");

        let mut dedup = GossipDedup::new();
        assert_eq!(receive(&mut ledger, &mut dedup, &raw, 1).expect("receive"), ReceiveOutcome::AlreadyCurrent);
        assert_eq!(ledger.head(), head);
    }

    #[test]
    fn gossip_that_bridges_the_gap_is_applied() {
        let (mut ledger, key_pair) = bootstrap();
        let head = ledger.head().to_string();
        let cs = signed(&head, &key_pair, Action::AddUser { pub_key: [9u8; 32] });
        let new_head = cs.id().expect("id");
        let gossip =
            Gossip { node_id: key_pair.node_id().expect("node id"), head: new_head.clone(), changes: vec![cs] };
        let raw = gossip.encode().expect("encode");

        let mut dedup = GossipDedup::new();
        let outcome = receive(&mut ledger, &mut dedup, &raw, 1).expect("receive");
        assert_eq!(outcome, ReceiveOutcome::Applied);
        assert!(outcome.should_forward());
        assert_eq!(ledger.head(), new_head);
    }

    #[test]
    fn gossip_with_a_missing_anchor_requires_pull_sync() {
        let (mut ledger, key_pair) = bootstrap();
        let cs = signed("changes1unreachableunreachableunreachableunreachableuu", &key_pair, Action::AddUser {
            pub_key: [9u8; 32],
        });
        let gossip =
            Gossip { node_id: key_pair.node_id().expect("node id"), head: cs.id().unwrap_or_default(), changes: vec![cs] };
        let raw = gossip.encode().expect("encode");

        let mut dedup = GossipDedup::new();
        let outcome = receive(&mut ledger, &mut dedup, &raw, 1).expect("receive");
        assert_eq!(outcome, ReceiveOutcome::PullSyncRequired);
        assert!(outcome.should_forward());
    }
}
