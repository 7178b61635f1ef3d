//! The content-addressed, signed, append-only ledger at the core of an
//! OWS project: canonical wire encoding, the policy engine, and the
//! snapshot state machine a sequence of change sets projects to.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod action;
pub mod change_set;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod policy;
pub mod snapshot;
pub mod store;

pub use action::Action;
pub use change_set::ChangeSet;
pub use error::LedgerError;
pub use ledger::Ledger;
pub use policy::{any_policy_allows, Effect, Policy, PolicyStatement};
pub use snapshot::{FunctionConfig, GatewayConfig, GatewayEndpointConfig, NodeConfig, Snapshot, UserConfig};
