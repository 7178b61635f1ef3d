//! The gossip wire message.

use ciborium::Value;
use ows_codec::canonical;
use ows_ledger::ChangeSet;

use crate::error::GossipError;

/// A push-gossip payload: the initiator, the head it is announcing, and
/// enough change sets for a receiver at an older head to reach it by
/// sequential append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gossip {
    /// The node id of whoever first originated this gossip.
    pub node_id: String,
    /// The change-set id this gossip announces as the new head.
    pub head: String,
    /// Change sets carried so a receiver can catch up, oldest first.
    pub changes: Vec<ChangeSet>,
}

impl Gossip {
    /// Canonically encodes this message to the bytes sent on the wire;
    /// this is also what [`crate::dedup::GossipDedup`] hashes.
    pub fn encode(&self) -> Result<Vec<u8>, GossipError> {
        let changes = self
            .changes
            .iter()
            .map(|cs| cs.encode().map(Value::Bytes))
            .collect::<Result<Vec<_>, _>>()?;
        let value = Value::Map(vec![
            (Value::Integer(0.into()), Value::Text(self.node_id.clone())),
            (Value::Integer(1.into()), Value::Text(self.head.clone())),
            (Value::Integer(2.into()), Value::Array(changes)),
        ]);
        Ok(canonical::encode(&value)?)
    }

    /// Decodes a gossip message, dispatching each change set's actions
    /// through the decoder table for `version`.
    pub fn decode(bytes: &[u8], version: u64) -> Result<Self, GossipError> {
        let value = canonical::decode(bytes)?;
        let Value::Map(entries) = value else {
            return Err(GossipError::Decode("gossip: expected map".to_string()));
        };
        let find = |key: u8| {
            entries
                .iter()
                .find(|(k, _)| matches!(k, Value::Integer(n) if *n == key.into()))
                .map(|(_, v)| v)
        };
        let node_id = match find(0) {
            Some(Value::Text(s)) => s.clone(),
            _ => return Err(GossipError::Decode("gossip: missing node_id".to_string())),
        };
        let head = match find(1) {
            Some(Value::Text(s)) => s.clone(),
            _ => return Err(GossipError::Decode("gossip: missing head".to_string())),
        };
        let changes = match find(2) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Bytes(b) => ChangeSet::decode(b, version).map_err(GossipError::from),
                    other => Err(GossipError::Decode(format!("gossip: expected bstr change set, got {other:?}"))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(GossipError::Decode("gossip: missing changes".to_string())),
        };
        Ok(Self { node_id, head, changes })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use ows_identity::KeyPair;

    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let key_pair = KeyPair::from_seed([1u8; 32]);
        let mut cs = ChangeSet::new(String::new(), vec![ows_ledger::Action::AddUser { pub_key: [2u8; 32] }]);
        cs.sign(&key_pair).expect("sign");
        let head = cs.id().expect("id");
        let gossip = Gossip { node_id: key_pair.node_id().expect("node id"), head, changes: vec![cs] };

        let encoded = gossip.encode().expect("encode");
        let decoded = Gossip::decode(&encoded, 1).expect("decode");
        assert_eq!(gossip, decoded);
    }
}
