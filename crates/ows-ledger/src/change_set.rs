//! Change sets: signed, ordered batches of actions.

use ciborium::Value;
use ows_codec::{blake2b128, encode_digest_id, HRP_CHANGES};
use ows_identity::{KeyPair, Signature};

use crate::action::Action;
use crate::error::LedgerError;
use crate::ids::prev_bytes;

/// A signed, ordered batch of actions. The id of a change set is derived
/// from its full encoding, signatures included, so appending a signature
/// changes the id; the *next* change set's `prev` therefore always
/// points at a fully signed predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Bech32 id of the previous change set, or the empty string for the
    /// initial configuration.
    pub prev: String,
    /// The actions applied by this change set, in order.
    pub actions: Vec<Action>,
    /// Detached signatures over [`ChangeSet::signing_bytes`], one per
    /// signer. A change set must carry at least one before it can be
    /// encoded or appended.
    pub signatures: Vec<Signature>,
}

impl ChangeSet {
    /// Builds an unsigned change set.
    #[must_use]
    pub const fn new(prev: String, actions: Vec<Action>) -> Self {
        Self { prev, actions, signatures: Vec::new() }
    }

    fn actions_value(&self) -> Result<Value, LedgerError> {
        let items = self
            .actions
            .iter()
            .map(Action::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(items))
    }

    fn prev_value(&self) -> Result<Value, LedgerError> {
        Ok(Value::Bytes(prev_bytes(&self.prev)?))
    }

    /// The bytes a signer signs: the change set's `prev` and `actions`,
    /// with no `signatures` field present.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        let value = Value::Map(vec![
            (Value::Integer(0.into()), self.prev_value()?),
            (Value::Integer(1.into()), self.actions_value()?),
        ]);
        ows_codec::canonical::encode(&value).map_err(LedgerError::from)
    }

    /// Appends `key_pair`'s signature over [`Self::signing_bytes`].
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), LedgerError> {
        let message = self.signing_bytes()?;
        self.signatures.push(key_pair.sign(&message));
        Ok(())
    }

    fn signatures_value(&self) -> Value {
        Value::Array(
            self.signatures
                .iter()
                .map(|sig| {
                    Value::Map(vec![
                        (Value::Integer(0.into()), Value::Bytes(sig.public_key.to_vec())),
                        (Value::Integer(1.into()), Value::Bytes(sig.bytes.to_vec())),
                    ])
                })
                .collect(),
        )
    }

    /// The full encoding, signatures included, that this change set's id
    /// is derived from and that is stored on the wire.
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        let value = Value::Map(vec![
            (Value::Integer(0.into()), self.prev_value()?),
            (Value::Integer(1.into()), self.actions_value()?),
            (Value::Integer(2.into()), self.signatures_value()),
        ]);
        ows_codec::canonical::encode(&value).map_err(LedgerError::from)
    }

    /// This change set's id: `bech32("changes", blake2b128(encode()))`.
    pub fn id(&self) -> Result<String, LedgerError> {
        let bytes = self.encode()?;
        let digest = blake2b128(&bytes);
        encode_digest_id(HRP_CHANGES, &digest).map_err(LedgerError::from)
    }

    /// The distinct public keys that have signed this change set.
    #[must_use]
    pub fn signers(&self) -> Vec<[u8; 32]> {
        let mut signers = Vec::new();
        for signature in &self.signatures {
            if !signers.contains(&signature.public_key) {
                signers.push(signature.public_key);
            }
        }
        signers
    }

    /// Verifies every signature against [`Self::signing_bytes`]. Fails
    /// closed: a change set with no signatures at all does not verify.
    pub fn verify_signatures(&self) -> Result<(), LedgerError> {
        if self.signatures.is_empty() {
            return Err(LedgerError::SignatureInvalid("change set has no signatures".to_string()));
        }
        let message = self.signing_bytes()?;
        for signature in &self.signatures {
            signature
                .verify(&message)
                .map_err(|err| LedgerError::SignatureInvalid(err.to_string()))?;
        }
        Ok(())
    }

    /// Decodes a change set, dispatching its actions' attribute fields
    /// through the decoder table for `version`.
    pub fn decode(bytes: &[u8], version: u64) -> Result<Self, LedgerError> {
        let value = ows_codec::canonical::decode(bytes).map_err(LedgerError::from)?;
        let Value::Map(entries) = value else {
            return Err(LedgerError::Decode("change set: expected map".to_string()));
        };
        let find = |key: i128| {
            entries
                .iter()
                .find(|(k, _)| matches!(k, Value::Integer(n) if *n == key.into()))
                .map(|(_, v)| v)
        };
        let prev_bytes_value = match find(0) {
            Some(Value::Bytes(b)) => b.clone(),
            _ => return Err(LedgerError::Decode("change set: missing prev".to_string())),
        };
        let prev = if prev_bytes_value.is_empty() {
            String::new()
        } else {
            let digest: [u8; ows_codec::DIGEST_LEN] = prev_bytes_value
                .as_slice()
                .try_into()
                .map_err(|_| LedgerError::Decode("change set: prev is not a 16-byte digest".to_string()))?;
            encode_digest_id(HRP_CHANGES, &digest).map_err(LedgerError::from)?
        };
        let actions = match find(1) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| Action::from_value(item, version))
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(LedgerError::Decode("change set: missing actions".to_string())),
        };
        let signatures = match find(2) {
            Some(Value::Array(items)) => items
                .iter()
                .map(decode_signature)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(LedgerError::Decode("change set: missing signatures".to_string())),
        };
        Ok(Self { prev, actions, signatures })
    }
}

fn decode_signature(value: &Value) -> Result<Signature, LedgerError> {
    let Value::Map(entries) = value else {
        return Err(LedgerError::Decode("signature: expected map".to_string()));
    };
    let find = |key: i128| {
        entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Integer(n) if *n == key.into()))
            .map(|(_, v)| v)
    };
    let public_key = match find(0) {
        Some(Value::Bytes(b)) => b
            .as_slice()
            .try_into()
            .map_err(|_| LedgerError::Decode(format!("signature: expected 32-byte key, got {}", b.len())))?,
        _ => return Err(LedgerError::Decode("signature: missing public key".to_string())),
    };
    let bytes = match find(1) {
        Some(Value::Bytes(b)) => b
            .as_slice()
            .try_into()
            .map_err(|_| LedgerError::Decode(format!("signature: expected 64-byte sig, got {}", b.len())))?,
        _ => return Err(LedgerError::Decode("signature: missing signature bytes".to_string())),
    };
    Ok(Signature { public_key, bytes })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::action::Action;

    #[test]
    fn signing_bytes_excludes_signatures() {
        let cs = ChangeSet::new(String::new(), vec![Action::AddUser { pub_key: [1u8; 32] }]);
        let mut signed = cs.clone();
        let key_pair = KeyPair::from_seed([1u8; 32]);
        signed.sign(&key_pair).expect("sign");
        assert_eq!(cs.signing_bytes().expect("unsigned bytes"), signed.signing_bytes().expect("signed bytes"));
    }

    #[test]
    fn signing_a_change_set_changes_its_id() {
        let mut cs = ChangeSet::new(String::new(), vec![Action::AddUser { pub_key: [2u8; 32] }]);
        let unsigned_encode = cs.encode();
        assert!(unsigned_encode.is_ok(), "empty signatures array still encodes");
        let key_pair = KeyPair::from_seed([2u8; 32]);
        cs.sign(&key_pair).expect("sign");
        let id_one = cs.id().expect("id one");
        cs.sign(&KeyPair::from_seed([3u8; 32])).expect("sign again");
        let id_two = cs.id().expect("id two");
        assert_ne!(id_one, id_two);
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let mut cs = ChangeSet::new(
            String::new(),
            vec![Action::AddFunction { runtime: "nodejs".to_string(), handler_asset_id: "asset1a".to_string() }],
        );
        cs.sign(&KeyPair::from_seed([4u8; 32])).expect("sign");
        let encoded = cs.encode().expect("encode");
        let decoded = ChangeSet::decode(&encoded, 1).expect("decode");
        assert_eq!(cs, decoded);
    }

    #[test]
    fn verify_signatures_rejects_tampered_actions() {
        let mut cs = ChangeSet::new(String::new(), vec![Action::AddUser { pub_key: [5u8; 32] }]);
        cs.sign(&KeyPair::from_seed([5u8; 32])).expect("sign");
        cs.actions.push(Action::AddUser { pub_key: [6u8; 32] });
        assert!(cs.verify_signatures().is_err());
    }

    #[test]
    fn verify_signatures_rejects_empty_signature_list() {
        let cs = ChangeSet::new(String::new(), vec![Action::AddUser { pub_key: [7u8; 32] }]);
        assert!(cs.verify_signatures().is_err());
    }
}
