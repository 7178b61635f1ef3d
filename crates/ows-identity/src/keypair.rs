//! Ed25519 key pairs, signatures, and BIP-39 backup phrases.

use bip39::Mnemonic;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use ows_codec::{blake2b128, encode_digest_id, HRP_NODE, HRP_USER};

use crate::error::IdentityError;

const WORD_COUNT: usize = 24;

/// An Ed25519 key pair. The seed (the private key's first 32 bytes) is the
/// only secret; everything else, including the public key, is derived from
/// it deterministically.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

/// A detached Ed25519 signature together with the public key that produced
/// it, as stored in a change set's signature list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// The 32-byte raw public key of the signer.
    pub public_key: [u8; 32],
    /// The 64-byte raw Ed25519 signature bytes.
    pub bytes: [u8; 64],
}

impl KeyPair {
    /// Generates a fresh key pair using the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Builds a key pair from an explicit 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Restores a key pair from its 24-word BIP-39 backup phrase.
    pub fn restore(words: &[String]) -> Result<Self, IdentityError> {
        if words.len() != WORD_COUNT {
            return Err(IdentityError::WrongWordCount(words.len()));
        }
        let phrase = words.join(" ");
        let mnemonic = Mnemonic::parse(&phrase)
            .map_err(|err| IdentityError::InvalidPhrase(err.to_string()))?;
        let entropy = mnemonic.to_entropy();
        let seed: [u8; 32] = entropy
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidPhrase("entropy was not 32 bytes".to_string()))?;
        Ok(Self::from_seed(seed))
    }

    /// Returns the 24-word BIP-39 backup phrase for this key pair's seed.
    pub fn phrase(&self) -> Result<Vec<String>, IdentityError> {
        let seed = self.signing_key.to_bytes();
        let mnemonic = Mnemonic::from_entropy(&seed)
            .map_err(|err| IdentityError::InvalidPhrase(err.to_string()))?;
        Ok(mnemonic.word_iter().map(str::to_string).collect())
    }

    /// Returns the raw 32-byte seed.
    #[must_use]
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Returns the raw 32-byte public key.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Returns the Ed25519 verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Derives this key's bech32 `node` id: `bech32("node",
    /// blake2b128(pub_key))`.
    pub fn node_id(&self) -> Result<String, IdentityError> {
        node_id(&self.public_key_bytes())
    }

    /// Derives this key's bech32 `user` id: `bech32("user",
    /// blake2b128(pub_key))`.
    pub fn user_id(&self) -> Result<String, IdentityError> {
        user_id(&self.public_key_bytes())
    }

    /// Signs `message`, producing a detached signature carrying this key's
    /// public key.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature {
            public_key: self.public_key_bytes(),
            bytes: sig.to_bytes(),
        }
    }
}

impl Signature {
    /// Verifies this signature against `message`.
    pub fn verify(&self, message: &[u8]) -> Result<(), IdentityError> {
        let verifying_key = VerifyingKey::from_bytes(&self.public_key)
            .map_err(|_| IdentityError::InvalidSignature)?;
        let signature = ed25519_dalek::Signature::from_bytes(&self.bytes);
        verifying_key
            .verify(message, &signature)
            .map_err(|_| IdentityError::InvalidSignature)
    }
}

/// Derives the bech32 `node` id for a raw public key.
pub fn node_id(public_key: &[u8; 32]) -> Result<String, IdentityError> {
    let digest = blake2b128(public_key);
    encode_digest_id(HRP_NODE, &digest).map_err(|err| IdentityError::InvalidKeyEncoding(err.to_string()))
}

/// Derives the bech32 `user` id for a raw public key.
pub fn user_id(public_key: &[u8; 32]) -> Result<String, IdentityError> {
    let digest = blake2b128(public_key);
    encode_digest_id(HRP_USER, &digest).map_err(|err| IdentityError::InvalidKeyEncoding(err.to_string()))
}

/// Parses a hex-encoded 32-byte public key.
pub fn parse_public_key(s: &str) -> Result<[u8; 32], IdentityError> {
    parse_32_bytes(s)
}

/// Parses a hex-encoded 32-byte seed (private key).
pub fn parse_private_key_seed(s: &str) -> Result<[u8; 32], IdentityError> {
    parse_32_bytes(s)
}

fn parse_32_bytes(s: &str) -> Result<[u8; 32], IdentityError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let trimmed = s.trim();
    let bytes = hex::decode(trimmed)
        .or_else(|_| STANDARD.decode(trimmed))
        .map_err(|_| IdentityError::InvalidKeyEncoding(format!("{trimmed} is neither valid hex nor base64")))?;
    bytes.as_slice().try_into().map_err(|_| {
        IdentityError::InvalidKeyEncoding(format!("expected 32 bytes, got {}", bytes.len()))
    })
}
