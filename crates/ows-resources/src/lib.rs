//! Three-way reconciliation of live resources against a new snapshot, and
//! the side-effect ports (gateway listeners, function assets, peer
//! directory) that reconciliation drives.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod diff;
pub mod error;
pub mod ports;
pub mod reconciler;

pub use diff::{reconcile, Diff};
pub use error::ResourceError;
pub use ports::{
    FunctionLoader, GatewayRuntime, InMemoryFunctionLoader, InMemoryGatewayRuntime,
    InMemoryPeerDirectory, PeerDirectory,
};
pub use reconciler::reconcile_snapshot;
