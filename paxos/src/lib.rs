#![deny(missing_docs)]
#![deny(clippy::all)]
//! Single-decree Paxos, one independent instance per key.
//!
//! Each replica runs an [`Acceptor`] behind an [`AcceptorSupervisor`] that
//! simulates crashes, a [`Learner`] applying chosen values to the replica's
//! [`Store`], and a [`Proposer`] driving rounds for the writes submitted to
//! it. Proposers reach replicas through the [`Peer`] trait.

mod acceptor;
mod action;
mod config;
mod error;
mod learner;
pub mod message;
pub mod peer;
mod proposal;
mod proposer;
mod supervisor;

/// Util function for testing.
pub mod tests;

pub use acceptor::{Acceptor, KeyState};
pub use action::Action;
pub use config::{AcceptShortfall, Config, CrashSimulation, DEFAULT_CLUSTER_SIZE};
pub use error::{Error, Phase, Result};
pub use learner::{Learner, Store};
pub use peer::{LocalPeer, Peer, RemotePeer, RoleClient, RoleServer, RoleService};
pub use proposal::{ProposalNumber, ProposalNumberGenerator, ID_BITS, MAX_REPLICAS};
pub use proposer::{choose_value, Decision, Proposer};
pub use supervisor::AcceptorSupervisor;
