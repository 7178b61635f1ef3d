//! The pull-sync algorithm: catch a local ledger up to a peer's head.

use ows_ledger::Ledger;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::peer::PeerClient;

/// Syncs `ledger` against `peer`, per §4.7: fetch the peer's head, bail
/// out if already equal, otherwise intersect id chains, discard any
/// locally divergent suffix, and fetch+append every change set the peer
/// has beyond the intersection point.
///
/// Leaves persistence to the caller — this only mutates `ledger` in
/// memory, the same way [`ows_ledger::Ledger::append`] does.
pub async fn sync(ledger: &mut Ledger, peer: &dyn PeerClient) -> Result<(), SyncError> {
    let remote_head = peer.head().await?;
    if remote_head == ledger.head() {
        debug!(head = %remote_head, "already at peer's head");
        return Ok(());
    }

    let remote_chain = peer.id_chain().await?;
    let resume_from = match ledger.intersect(&remote_chain)? {
        Some(common_index) => {
            ledger.keep(common_index)?;
            common_index + 1
        }
        None => 0,
    };

    for id in &remote_chain[resume_from..] {
        let cs = peer.change_set(id).await?;
        let served_id = cs.id()?;
        if &served_id != id {
            return Err(SyncError::MismatchedChangeSet { expected: id.clone(), served: served_id });
        }
        ledger.append(cs)?;
    }

    info!(head = %ledger.head(), "synced to peer");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::sync::Mutex;

    use async_trait::async_trait;
    use ows_codec::LedgerVersion;
    use ows_identity::KeyPair;
    use ows_ledger::{Action, ChangeSet};

    use super::*;

    struct FakePeer {
        ledger: Mutex<Ledger>,
    }

    #[async_trait]
    impl PeerClient for FakePeer {
        async fn head(&self) -> Result<String, SyncError> {
            Ok(self.ledger.lock().expect("lock").head().to_string())
        }

        async fn id_chain(&self) -> Result<Vec<String>, SyncError> {
            self.ledger.lock().expect("lock").id_chain().map_err(SyncError::from)
        }

        async fn change_set(&self, id: &str) -> Result<ChangeSet, SyncError> {
            let ledger = self.ledger.lock().expect("lock");
            let chain = ledger.id_chain()?;
            let index = chain
                .iter()
                .position(|entry| entry == id)
                .ok_or_else(|| SyncError::Transport(format!("peer has no change set {id}")))?;
            Ok(ledger.change_sets()[index].clone())
        }
    }

    fn signed(prev: &str, actions: Vec<Action>, key_pair: &KeyPair) -> ChangeSet {
        let mut cs = ChangeSet::new(prev.to_string(), actions);
        cs.sign(key_pair).expect("sign");
        cs
    }

    #[tokio::test]
    async fn sync_catches_up_an_empty_ledger() {
        let root = KeyPair::from_seed([1u8; 32]);
        let mut remote = Ledger::empty(LedgerVersion::CURRENT);
        remote.append(signed("", vec![Action::AddUser { pub_key: [9u8; 32] }], &root)).expect("append first");
        let head = remote.head().to_string();
        remote.append(signed(&head, vec![Action::AddGateway { port: 8090 }], &root)).expect("append second");

        let peer = FakePeer { ledger: Mutex::new(remote.clone()) };
        let mut local = Ledger::empty(LedgerVersion::CURRENT);
        sync(&mut local, &peer).await.expect("sync");
        assert_eq!(local.head(), remote.head());
        assert_eq!(local.change_sets().len(), 2);
    }

    #[tokio::test]
    async fn sync_is_a_no_op_when_already_at_head() {
        let root = KeyPair::from_seed([2u8; 32]);
        let mut remote = Ledger::empty(LedgerVersion::CURRENT);
        remote.append(signed("", vec![Action::AddUser { pub_key: [8u8; 32] }], &root)).expect("append");
        let peer = FakePeer { ledger: Mutex::new(remote.clone()) };

        let mut local = remote.clone();
        sync(&mut local, &peer).await.expect("sync");
        assert_eq!(local.change_sets().len(), 1);
    }

    #[tokio::test]
    async fn sync_discards_a_locally_divergent_suffix() {
        let root = KeyPair::from_seed([3u8; 32]);
        let mut common = Ledger::empty(LedgerVersion::CURRENT);
        common.append(signed("", vec![Action::AddUser { pub_key: [7u8; 32] }], &root)).expect("append common");

        let mut remote = common.clone();
        let head = remote.head().to_string();
        remote.append(signed(&head, vec![Action::AddGateway { port: 8091 }], &root)).expect("append remote");

        let mut local = common.clone();
        let head = local.head().to_string();
        local.append(signed(&head, vec![Action::AddGateway { port: 9091 }], &root)).expect("append divergent");

        let peer = FakePeer { ledger: Mutex::new(remote.clone()) };
        sync(&mut local, &peer).await.expect("sync");
        assert_eq!(local.head(), remote.head());
        assert_eq!(local.snapshot().gateways.len(), 1);
    }
}
