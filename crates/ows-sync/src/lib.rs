//! Pull-sync protocol: catching a local ledger up to a peer's head by
//! id-chain intersection and sequential change-set append.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod error;
pub mod peer;
pub mod sync;

pub use error::SyncError;
pub use peer::PeerClient;
pub use sync::sync;
