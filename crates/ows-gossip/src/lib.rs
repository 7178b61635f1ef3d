//! Push-gossip: a bounded recent-payload dedup, a deterministic
//! one-to-closest forwarding overlay, and the receive-and-forward
//! algorithm that ties them to the ledger.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![deny(clippy::todo, clippy::unimplemented, clippy::dbg_macro)]
#![deny(clippy::print_stdout, clippy::print_stderr)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod dedup;
pub mod error;
pub mod message;
pub mod receive;
pub mod topology;

pub use dedup::GossipDedup;
pub use error::GossipError;
pub use message::Gossip;
pub use receive::{receive, ReceiveOutcome};
pub use topology::{distance, one_to_closest};
