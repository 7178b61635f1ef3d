//! Mutual-TLS HTTP peer API: the route table nodes and clients speak over.
//!
//! There is no certificate authority or bearer token anywhere in this
//! stack. A connecting peer presents a self-signed certificate binding
//! its Ed25519 identity key; [`acceptor::PeerCertAcceptor`] pulls that
//! certificate out of the completed handshake, [`peer_role::resolve_peer`]
//! classifies the embedded key against the node's current snapshot, and
//! [`router`] dispatches the request to a [`api::NodeApi`] implementation
//! that knows nothing about TLS at all.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod acceptor;
pub mod api;
pub mod error;
pub mod peer_role;
pub mod router;
pub mod server;

pub use acceptor::{PeerCertAcceptor, PeerCertificate};
pub use api::{NodeApi, VerifiedPeer};
pub use error::NetError;
pub use router::{build_api_router, build_gossip_router};
pub use server::serve_mtls;
