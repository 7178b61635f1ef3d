//! Ed25519 keys, BIP-39 backup phrases, and mutual-TLS peer identity for
//! the OWS ledger.
//!
//! Every user and node has an Ed25519 key pair. There is no certificate
//! authority anywhere in the system: peers authenticate each other by
//! embedding their Ed25519 public key directly in a self-signed X.509
//! certificate and having the other side check that key against a
//! caller-supplied predicate instead of a trust chain.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod certificate;
pub mod error;
pub mod keypair;
pub mod role;
pub mod verifier;

pub use certificate::{extract_ed25519_public_key, make_self_signed, IdentityCertificate};
pub use error::IdentityError;
pub use keypair::{node_id, parse_private_key_seed, parse_public_key, user_id, KeyPair, Signature};
pub use role::{PeerRole, PeerRoleClassifier};
pub use verifier::{PeerPredicate, PredicateClientVerifier, PredicateServerVerifier};

/// Name of the environment variable carrying a node's or client's private
/// key seed, hex-encoded.
pub const PRIVATE_KEY_ENV: &str = "OWS_PRIVATE_KEY";
