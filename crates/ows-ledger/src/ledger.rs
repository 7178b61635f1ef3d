//! The append-only ledger: a sequence of validated change sets and the
//! snapshot they project to.

use ciborium::Value;
use ows_codec::{canonical, decode_digest_id, encode_digest_id, LedgerVersion, HRP_CHANGES, HRP_PROJECT};

use crate::change_set::ChangeSet;
use crate::error::LedgerError;
use crate::policy::any_policy_allows;
use crate::snapshot::Snapshot;

/// A validated sequence of change sets together with the snapshot state
/// they project to. Every mutation goes through [`Ledger::append`],
/// which only ever commits a change set that validates cleanly against
/// the current snapshot.
#[derive(Debug, Clone)]
pub struct Ledger {
    version: LedgerVersion,
    change_sets: Vec<ChangeSet>,
    snapshot: Snapshot,
}

impl Ledger {
    /// The ledger's wire version.
    #[must_use]
    pub const fn version(&self) -> LedgerVersion {
        self.version
    }

    /// The change sets that make up this ledger, in order.
    #[must_use]
    pub fn change_sets(&self) -> &[ChangeSet] {
        &self.change_sets
    }

    /// The current projected state.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The id of the most recently appended change set, or the empty
    /// string if the ledger has no change sets yet.
    #[must_use]
    pub fn head(&self) -> &str {
        &self.snapshot.head
    }

    /// This ledger's project id: `bech32("project", payload_of(first
    /// change set's id))`.
    pub fn project_id(&self) -> Result<String, LedgerError> {
        let first = self
            .change_sets
            .first()
            .ok_or_else(|| LedgerError::InvariantViolation("ledger has no change sets".to_string()))?;
        let digest = decode_digest_id(&first.id()?, HRP_CHANGES)?;
        Ok(encode_digest_id(HRP_PROJECT, &digest)?)
    }

    /// Builds an empty ledger at `version`, ready to accept its initial
    /// change set.
    #[must_use]
    pub fn empty(version: LedgerVersion) -> Self {
        Self { version, change_sets: Vec::new(), snapshot: Snapshot::new(version) }
    }

    /// Validates `cs` as a ledger's very first change set: `prev` must be
    /// empty, every signature must verify, its signers become the
    /// ledger's root users, and its actions are applied without any
    /// policy check (there is no policy to check yet).
    fn validate_first_change_set(snapshot: &mut Snapshot, cs: &ChangeSet) -> Result<(), LedgerError> {
        if !cs.prev.is_empty() {
            return Err(LedgerError::PrevMismatch { expected: String::new(), actual: cs.prev.clone() });
        }
        cs.verify_signatures()?;
        snapshot.add_root_users(&cs.signers())?;
        let id = cs.id()?;
        for (index, action) in cs.actions.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            action.apply(snapshot, &cs.prev, index as u64)?;
        }
        snapshot.head = id;
        Ok(())
    }

    /// Validates `cs` as a subsequent change set: `prev` must match the
    /// snapshot's current head, every signature must verify, and every
    /// action must be authorized by at least one of its signers'
    /// policies. The whole change set is rejected if any action fails;
    /// nothing from it is applied partially.
    fn validate_subsequent_change_set(snapshot: &mut Snapshot, cs: &ChangeSet) -> Result<(), LedgerError> {
        if cs.prev != snapshot.head {
            return Err(LedgerError::PrevMismatch { expected: snapshot.head.clone(), actual: cs.prev.clone() });
        }
        cs.verify_signatures()?;
        let policies = snapshot.user_policies(&cs.signers())?;
        let id = cs.id()?;
        for (index, action) in cs.actions.iter().enumerate() {
            if !any_policy_allows(&policies, action.category(), action.name(), &action.resources()) {
                return Err(LedgerError::Unauthorized {
                    category: action.category().to_string(),
                    name: action.name().to_string(),
                });
            }
            #[allow(clippy::cast_possible_truncation)]
            action.apply(snapshot, &cs.prev, index as u64)?;
        }
        snapshot.head = id;
        Ok(())
    }

    /// Validates and appends `cs`. Validation runs against a clone of the
    /// current snapshot; `cs` is only committed to the ledger if the
    /// clone validates cleanly, so a rejected change set leaves the
    /// ledger untouched.
    pub fn append(&mut self, cs: ChangeSet) -> Result<(), LedgerError> {
        let mut candidate = self.snapshot.clone();
        if self.change_sets.is_empty() {
            Self::validate_first_change_set(&mut candidate, &cs)?;
        } else {
            Self::validate_subsequent_change_set(&mut candidate, &cs)?;
        }
        self.snapshot = candidate;
        self.change_sets.push(cs);
        Ok(())
    }

    /// Replays `change_sets` from scratch into a fresh ledger, as if each
    /// had just been appended in order.
    pub fn build(version: LedgerVersion, change_sets: Vec<ChangeSet>) -> Result<Self, LedgerError> {
        let mut ledger = Self::empty(version);
        for cs in change_sets {
            ledger.append(cs)?;
        }
        Ok(ledger)
    }

    /// Decodes a ledger from its wire form: a CBOR array whose first
    /// element is the ledger version and whose remaining elements are
    /// each change set's canonical encoding, and replays every change set
    /// to rebuild the snapshot.
    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        let value = canonical::decode(bytes).map_err(LedgerError::from)?;
        let Value::Array(items) = value else {
            return Err(LedgerError::Decode("ledger: expected array".to_string()));
        };
        let Some((head, rest)) = items.split_first() else {
            return Err(LedgerError::Decode("ledger: missing version".to_string()));
        };
        let Value::Integer(version) = head else {
            return Err(LedgerError::Decode("ledger: version is not an integer".to_string()));
        };
        let version: u64 = i128::from(*version)
            .try_into()
            .map_err(|_| LedgerError::Decode("ledger: version out of range".to_string()))?;
        let change_sets = rest
            .iter()
            .map(|item| match item {
                Value::Bytes(b) => ChangeSet::decode(b, version),
                other => Err(LedgerError::Decode(format!("ledger: expected bstr change set, got {other:?}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(LedgerVersion::new(version), change_sets)
    }

    /// Encodes the ledger to its wire form.
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        let mut items = vec![Value::Integer(i128::from(self.version.get()).into())];
        for cs in &self.change_sets {
            items.push(Value::Bytes(cs.encode()?));
        }
        canonical::encode(&Value::Array(items)).map_err(LedgerError::from)
    }

    /// Returns the bech32 id of every change set in order.
    pub fn id_chain(&self) -> Result<Vec<String>, LedgerError> {
        self.change_sets.iter().map(ChangeSet::id).collect()
    }

    /// Finds the index of the last change set this ledger has in common
    /// with `other_chain`, a peer's own id chain in the same order. Fails
    /// only if the very first entries diverge, meaning `other_chain`
    /// belongs to a different project entirely.
    pub fn intersect(&self, other_chain: &[String]) -> Result<Option<usize>, LedgerError> {
        let own_chain = self.id_chain()?;
        if own_chain.is_empty() || other_chain.is_empty() {
            return Ok(None);
        }
        if own_chain[0] != other_chain[0] {
            return Err(LedgerError::InvariantViolation(
                "id chains diverge at the first change set; different projects".to_string(),
            ));
        }
        let common = own_chain
            .iter()
            .zip(other_chain.iter())
            .take_while(|(a, b)| a == b)
            .count();
        Ok(Some(common - 1))
    }

    /// Truncates the ledger to its first `until_index + 1` change sets
    /// and rebuilds the snapshot from scratch. The truncated prefix was
    /// already known to validate when first appended, so a revalidation
    /// failure here means the ledger's in-memory invariants were
    /// violated elsewhere; that is a bug, not a recoverable error.
    pub fn keep(&mut self, until_index: usize) -> Result<(), LedgerError> {
        if until_index >= self.change_sets.len() {
            return Err(LedgerError::InvariantViolation(format!(
                "keep index {until_index} out of range for {} change sets",
                self.change_sets.len()
            )));
        }
        let kept: Vec<ChangeSet> = self.change_sets[..=until_index].to_vec();
        match Self::build(self.version, kept) {
            Ok(rebuilt) => {
                *self = rebuilt;
                Ok(())
            }
            Err(err) => unreachable!("previously validated ledger prefix failed to revalidate: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::action::Action;
    use ows_identity::KeyPair;

    fn signed(prev: &str, actions: Vec<Action>, key_pair: &KeyPair) -> ChangeSet {
        let mut cs = ChangeSet::new(prev.to_string(), actions);
        cs.sign(key_pair).expect("sign");
        cs
    }

    #[test]
    fn first_change_set_bootstraps_root_user_and_applies_actions() {
        let root = KeyPair::from_seed([1u8; 32]);
        let cs = signed(
            "",
            vec![Action::AddFunction { runtime: "nodejs".to_string(), handler_asset_id: "asset1a".to_string() }],
            &root,
        );
        let mut ledger = Ledger::empty(LedgerVersion::CURRENT);
        ledger.append(cs).expect("append first change set");
        assert_eq!(ledger.snapshot().functions.len(), 1);
        let root_user_id = root.user_id().expect("user id");
        assert!(ledger.snapshot().users.get(&root_user_id).is_some_and(|u| u.is_root));
    }

    #[test]
    fn subsequent_change_set_rejects_prev_mismatch() {
        let root = KeyPair::from_seed([2u8; 32]);
        let first = signed("", vec![Action::AddUser { pub_key: [9u8; 32] }], &root);
        let mut ledger = Ledger::empty(LedgerVersion::CURRENT);
        ledger.append(first).expect("append first");
        let bogus = signed("changes1notarealid", vec![Action::AddUser { pub_key: [3u8; 32] }], &root);
        let err = ledger.append(bogus);
        assert!(matches!(err, Err(LedgerError::PrevMismatch { .. })));
    }

    #[test]
    fn subsequent_change_set_rejects_unauthorized_signer() {
        let root = KeyPair::from_seed([4u8; 32]);
        let outsider = KeyPair::from_seed([5u8; 32]);
        let first = signed("", vec![Action::AddUser { pub_key: outsider.public_key_bytes() }], &root);
        let mut ledger = Ledger::empty(LedgerVersion::CURRENT);
        ledger.append(first).expect("append first");
        let head = ledger.head().to_string();
        let unauthorized = signed(&head, vec![Action::AddGateway { port: 9000 }], &outsider);
        let err = ledger.append(unauthorized);
        assert!(matches!(err, Err(LedgerError::Unauthorized { .. })));
    }

    #[test]
    fn whole_change_set_is_rejected_on_any_action_failure() {
        let root = KeyPair::from_seed([6u8; 32]);
        let first = signed("", vec![], &root);
        let mut ledger = Ledger::empty(LedgerVersion::CURRENT);
        ledger.append(first).expect("append first");
        let head = ledger.head().to_string();
        let batch = signed(
            &head,
            vec![
                Action::AddFunction { runtime: "nodejs".to_string(), handler_asset_id: "asset1a".to_string() },
                Action::RemoveFunction { fn_id: "fn1doesnotexist".to_string() },
            ],
            &root,
        );
        let err = ledger.append(batch);
        assert!(err.is_err());
        assert!(ledger.snapshot().functions.is_empty(), "rejected change set must not partially apply");
    }

    #[test]
    fn encode_decode_round_trips_a_multi_change_set_ledger() {
        let root = KeyPair::from_seed([7u8; 32]);
        let first = signed("", vec![Action::AddUser { pub_key: [1u8; 32] }], &root);
        let mut ledger = Ledger::empty(LedgerVersion::CURRENT);
        ledger.append(first).expect("append first");
        let head = ledger.head().to_string();
        let second = signed(&head, vec![Action::AddGateway { port: 7000 }], &root);
        ledger.append(second).expect("append second");

        let encoded = ledger.encode().expect("encode");
        let decoded = Ledger::decode(&encoded).expect("decode");
        assert_eq!(decoded.head(), ledger.head());
        assert_eq!(decoded.snapshot().gateways.len(), 1);
    }

    #[test]
    fn keep_truncates_and_revalidates() {
        let root = KeyPair::from_seed([8u8; 32]);
        let first = signed("", vec![Action::AddUser { pub_key: [1u8; 32] }], &root);
        let mut ledger = Ledger::empty(LedgerVersion::CURRENT);
        ledger.append(first.clone()).expect("append first");
        let head = ledger.head().to_string();
        let second = signed(&head, vec![Action::AddGateway { port: 7001 }], &root);
        ledger.append(second).expect("append second");
        assert_eq!(ledger.change_sets().len(), 2);

        ledger.keep(0).expect("keep first only");
        assert_eq!(ledger.change_sets().len(), 1);
        assert_eq!(ledger.head(), first.id().expect("first id").as_str());
        assert!(ledger.snapshot().gateways.is_empty());
    }

    #[test]
    fn intersect_finds_longest_common_prefix() {
        let root = KeyPair::from_seed([9u8; 32]);
        let first = signed("", vec![Action::AddUser { pub_key: [1u8; 32] }], &root);
        let mut a = Ledger::empty(LedgerVersion::CURRENT);
        a.append(first.clone()).expect("append first to a");
        let mut b = Ledger::empty(LedgerVersion::CURRENT);
        b.append(first).expect("append first to b");

        let head = a.head().to_string();
        let second = signed(&head, vec![Action::AddGateway { port: 7002 }], &root);
        a.append(second).expect("append second to a only");

        let common = a.intersect(&b.id_chain().expect("b chain")).expect("intersect");
        assert_eq!(common, Some(0));
    }

    #[test]
    fn intersect_rejects_different_projects() {
        let root_a = KeyPair::from_seed([10u8; 32]);
        let root_b = KeyPair::from_seed([11u8; 32]);
        let mut a = Ledger::empty(LedgerVersion::CURRENT);
        a.append(signed("", vec![Action::AddUser { pub_key: [1u8; 32] }], &root_a)).expect("append a");
        let mut b = Ledger::empty(LedgerVersion::CURRENT);
        b.append(signed("", vec![Action::AddUser { pub_key: [2u8; 32] }], &root_b)).expect("append b");

        let err = a.intersect(&b.id_chain().expect("b chain"));
        assert!(err.is_err());
    }
}
