use std::fmt;

use thiserror::Error;

use crate::ProposalNumber;

/// Phase of a proposal round that can fall short of a quorum.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Phase 1, collecting promises.
    Prepare,
    /// Phase 2, collecting accepts.
    Accept,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => f.write_str("prepare"),
            Phase::Accept => f.write_str("accept"),
        }
    }
}

/// Why a write did not commit.
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer than a majority of replicas answered a phase.
    #[error("{phase} phase reached {responses}/{majority} replicas")]
    QuorumNotReached {
        /// Phase that fell short.
        phase: Phase,
        /// Positive responses collected.
        responses: usize,
        /// Responses needed.
        majority: usize,
    },

    /// The accept phase fell short even after its retry, and the value was
    /// sent to learners anyway. Only happens with `AcceptShortfall::Degraded`.
    #[error("proposal {proposal} learned with only {accepted}/{majority} accepts")]
    Degraded {
        /// Round that was learned.
        proposal: ProposalNumber,
        /// Accepts collected.
        accepted: usize,
        /// Accepts needed.
        majority: usize,
    },

    /// Every round allowed for this write chose somebody else's value.
    #[error("pre-empted in all {rounds} rounds")]
    Exhausted {
        /// Rounds attempted.
        rounds: usize,
    },

    /// The proposer has not been wired to any replica.
    #[error("proposer has no replicas to talk to")]
    Unwired,

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result alias for the consensus core.
pub type Result<T> = std::result::Result<T, Error>;
