use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::proposal::MAX_REPLICAS;
use crate::{Error, Result};

/// Replica count the store is deployed with unless told otherwise.
pub const DEFAULT_CLUSTER_SIZE: usize = 5;

/// How acceptor crashes are simulated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashSimulation {
    /// Fewest successful live checks before a crash.
    pub min_checks: u32,
    /// Most successful live checks before a crash.
    pub max_checks: u32,
    /// Extra live checks a crashed acceptor stays down after the check that
    /// discovered the crash. Zero means it is replaced on that same check.
    pub recovery_delay: u32,
}

impl Default for CrashSimulation {
    fn default() -> Self {
        Self {
            min_checks: 1,
            max_checks: 6,
            recovery_delay: 0,
        }
    }
}

/// What a proposer does when phase 2 misses a majority on its retry too.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptShortfall {
    /// Abort the write without sending anything to learners.
    Strict,
    /// Send the value to learners anyway and report failure. Unsafe: a
    /// minority-accepted value can be learned.
    Degraded,
}

/// Tunables shared by every role of a replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of replicas in the cluster.
    pub cluster_size: usize,
    /// Acceptor failure simulation, `None` to keep acceptors up.
    pub crash: Option<CrashSimulation>,
    /// Behaviour when phase 2 retry misses a majority.
    pub accept_shortfall: AcceptShortfall,
    /// Rounds a single write may run before giving up on being pre-empted.
    pub max_rounds: usize,
    /// Per-call timeout towards remote replicas, in milliseconds.
    pub rpc_timeout_ms: u64,
    /// Seed for crash countdowns, random when absent.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_size: DEFAULT_CLUSTER_SIZE,
            crash: Some(CrashSimulation::default()),
            accept_shortfall: AcceptShortfall::Strict,
            max_rounds: 8,
            rpc_timeout_ms: 3_000,
            seed: None,
        }
    }
}

impl Config {
    /// Sets the number of replicas.
    pub fn with_cluster_size(mut self, cluster_size: usize) -> Self {
        self.cluster_size = cluster_size;
        self
    }

    /// Sets the crash simulation, `None` to keep acceptors up.
    pub fn with_crash(mut self, crash: Option<CrashSimulation>) -> Self {
        self.crash = crash;
        self
    }

    /// Sets what happens when phase 2 misses a majority twice.
    pub fn with_accept_shortfall(mut self, accept_shortfall: AcceptShortfall) -> Self {
        self.accept_shortfall = accept_shortfall;
        self
    }

    /// Sets how many rounds a write may lose before giving up.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the per-call timeout towards remote replicas.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Makes crash countdowns reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Smallest number of replicas whose agreement is binding.
    pub fn majority(&self) -> usize {
        self.cluster_size / 2 + 1
    }

    /// Per-call timeout towards remote replicas.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Checks that every field is in range.
    pub fn validate(&self) -> Result<()> {
        if self.cluster_size == 0 || self.cluster_size > MAX_REPLICAS as usize {
            return Err(Error::InvalidConfig(format!(
                "cluster size {} outside 1..={}",
                self.cluster_size, MAX_REPLICAS
            )));
        }
        if let Some(crash) = &self.crash {
            if crash.min_checks == 0 || crash.min_checks > crash.max_checks {
                return Err(Error::InvalidConfig(format!(
                    "crash checks {}..={} must be a non-empty range above zero",
                    crash.min_checks, crash.max_checks
                )));
            }
        }
        if self.max_rounds == 0 {
            return Err(Error::InvalidConfig("max_rounds must be positive".into()));
        }
        Ok(())
    }
}
