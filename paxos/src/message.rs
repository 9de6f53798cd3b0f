//! Messages exchanged between proposers, acceptors and learners.

use serde::{Deserialize, Serialize};

use crate::{Action, ProposalNumber};

/// Phase 1a: asks an acceptor to promise `proposal` for `key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    /// Number of the round being prepared.
    pub proposal: ProposalNumber,
    /// Key the round decides.
    pub key: String,
    /// Replica id of the proposer.
    pub proposer_id: u32,
}

/// A value an acceptor has accepted, with the round that carried it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedValue {
    /// Round the value was accepted in.
    pub proposal: ProposalNumber,
    /// The accepted value.
    pub action: Action,
}

/// Phase 1b: the acceptor promised `proposal`, and reports what it had
/// already accepted for the key, if anything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseResponse {
    /// Number promised.
    pub proposal: ProposalNumber,
    /// Highest value accepted for the key before this promise.
    pub accepted: Option<AcceptedValue>,
}

/// Phase 2a: asks an acceptor to accept `action` under `proposal`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptRequest {
    /// Number of the round.
    pub proposal: ProposalNumber,
    /// Replica id of the proposer.
    pub proposer_id: u32,
    /// Value to accept, its key included.
    pub action: Action,
}

/// Phase 2b: the acceptor accepted `action` under `proposal`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptResponse {
    /// Number accepted.
    pub proposal: ProposalNumber,
    /// Value accepted.
    pub action: Action,
}

/// Phase 3: tells a learner the value chosen in `proposal`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnMessage {
    /// Round that chose the value.
    pub proposal: ProposalNumber,
    /// Replica id of the proposer.
    pub proposer_id: u32,
    /// The chosen value.
    pub action: Action,
}
