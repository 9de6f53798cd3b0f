use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, trace, warn};
use parking_lot::RwLock;

use crate::config::{AcceptShortfall, Config};
use crate::message::{AcceptRequest, LearnMessage, PrepareRequest, PromiseResponse};
use crate::peer::Peer;
use crate::{Action, Error, Phase, ProposalNumber, ProposalNumberGenerator, Result};

/// A round that got its value accepted by a majority and sent to learners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Number of the round.
    pub proposal: ProposalNumber,
    /// Value chosen in the round, possibly recovered from an earlier round.
    pub action: Action,
}

/// Drives Paxos rounds for the writes submitted to one replica.
///
/// Every replica may propose; there is no leader. The only state kept across
/// rounds is the proposal counter.
pub struct Proposer {
    id: u32,
    config: Config,
    generator: ProposalNumberGenerator,
    peers: RwLock<Vec<Arc<dyn Peer>>>,
}

impl Proposer {
    /// Creates the proposer of replica `id`, wired to no replica yet.
    pub fn new(id: u32, config: Config) -> Result<Self> {
        Ok(Self {
            id,
            generator: ProposalNumberGenerator::new(id)?,
            config,
            peers: RwLock::new(Vec::new()),
        })
    }

    /// Sets the replicas this proposer talks to, itself included.
    pub fn set_peers(&self, peers: Vec<Arc<dyn Peer>>) {
        if peers.len() != self.config.cluster_size {
            warn!(
                "proposer {} wired with {} replicas, configured for {}",
                self.id,
                peers.len(),
                self.config.cluster_size
            );
        }
        *self.peers.write() = peers;
    }

    /// Replica id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Gets `action` committed on the cluster.
    ///
    /// When a round recovers a value accepted earlier by some acceptor, that
    /// value is committed instead and a fresh round is started for `action`,
    /// up to `max_rounds` rounds in total. Returns the round that committed
    /// `action`.
    pub async fn propose(&self, action: Action) -> Result<ProposalNumber> {
        for round in 1..=self.config.max_rounds {
            let decision = self.run_round(&action).await?;
            if decision.action == action {
                info!(
                    "proposer {} reached consensus on key [{}] in {}: {}",
                    self.id,
                    action.key(),
                    decision.proposal,
                    action
                );
                return Ok(decision.proposal);
            }
            warn!(
                "proposer {} was pre-empted in round {}/{}, chosen: {}",
                self.id, round, self.config.max_rounds, decision.action
            );
        }
        Err(Error::Exhausted {
            rounds: self.config.max_rounds,
        })
    }

    /// Runs one round: prepare, accept (retried once with a new number when
    /// it misses a majority), learn.
    pub async fn run_round(&self, action: &Action) -> Result<Decision> {
        let peers = self.peers.read().clone();
        if peers.is_empty() {
            return Err(Error::Unwired);
        }
        let majority = self.config.majority();
        let mut retried = false;
        loop {
            let proposal = self.generator.next();
            debug!(
                "proposer {} preparing {} for key [{}]",
                self.id,
                proposal,
                action.key()
            );

            let promises = self.prepare(&peers, proposal, action.key()).await;
            if promises.len() < majority {
                warn!(
                    "proposer {} got {}/{} promises, aborting {}",
                    self.id,
                    promises.len(),
                    peers.len(),
                    proposal
                );
                return Err(Error::QuorumNotReached {
                    phase: Phase::Prepare,
                    responses: promises.len(),
                    majority,
                });
            }

            let chosen = choose_value(&promises).unwrap_or_else(|| action.clone());
            if chosen != *action {
                debug!(
                    "proposer {} recovered {} for {}",
                    self.id, chosen, proposal
                );
            }

            let accepted = self.accept(&peers, proposal, &chosen).await;
            if accepted < majority {
                warn!(
                    "proposer {} got {}/{} accepts for {}",
                    self.id,
                    accepted,
                    peers.len(),
                    proposal
                );
                if !retried {
                    retried = true;
                    info!("proposer {} retrying key [{}] once", self.id, action.key());
                    continue;
                }
                match self.config.accept_shortfall {
                    AcceptShortfall::Strict => {
                        return Err(Error::QuorumNotReached {
                            phase: Phase::Accept,
                            responses: accepted,
                            majority,
                        })
                    }
                    AcceptShortfall::Degraded => {
                        warn!(
                            "proposer {} sending {} to learners without a majority",
                            self.id, proposal
                        );
                        self.learn(&peers, proposal, &chosen).await;
                        return Err(Error::Degraded {
                            proposal,
                            accepted,
                            majority,
                        });
                    }
                }
            }

            self.learn(&peers, proposal, &chosen).await;
            return Ok(Decision {
                proposal,
                action: chosen,
            });
        }
    }

    async fn prepare(
        &self,
        peers: &[Arc<dyn Peer>],
        proposal: ProposalNumber,
        key: &str,
    ) -> Vec<PromiseResponse> {
        let req = PrepareRequest {
            proposal,
            key: key.to_owned(),
            proposer_id: self.id,
        };
        let replies = join_all(peers.iter().map(|p| p.prepare(req.clone()))).await;
        peers
            .iter()
            .zip(replies)
            .filter_map(|(peer, reply)| match reply {
                Ok(promise) => promise,
                Err(e) => {
                    debug!("prepare {} to replica {} failed: {}", proposal, peer.id(), e);
                    None
                }
            })
            .collect()
    }

    async fn accept(&self, peers: &[Arc<dyn Peer>], proposal: ProposalNumber, action: &Action) -> usize {
        let req = AcceptRequest {
            proposal,
            proposer_id: self.id,
            action: action.clone(),
        };
        let replies = join_all(peers.iter().map(|p| p.accept(req.clone()))).await;
        peers
            .iter()
            .zip(replies)
            .filter(|(peer, reply)| match reply {
                Ok(accepted) => accepted.is_some(),
                Err(e) => {
                    debug!("accept {} to replica {} failed: {}", proposal, peer.id(), e);
                    false
                }
            })
            .count()
    }

    async fn learn(&self, peers: &[Arc<dyn Peer>], proposal: ProposalNumber, action: &Action) {
        let msg = LearnMessage {
            proposal,
            proposer_id: self.id,
            action: action.clone(),
        };
        let replies = join_all(peers.iter().map(|p| p.learn(msg.clone()))).await;
        for (peer, reply) in peers.iter().zip(replies) {
            if let Err(e) = reply {
                warn!("learn {} to replica {} failed: {}", proposal, peer.id(), e);
            }
        }
        trace!("proposer {} finished learn phase of {}", self.id, proposal);
    }
}

/// The value accepted under the highest proposal among `promises`, if any
/// acceptor reported one.
pub fn choose_value(promises: &[PromiseResponse]) -> Option<Action> {
    promises
        .iter()
        .filter_map(|p| p.accepted.as_ref())
        .max_by_key(|accepted| accepted.proposal)
        .map(|accepted| accepted.action.clone())
}
