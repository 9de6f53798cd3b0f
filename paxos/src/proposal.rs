use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Low-order bits reserved for the proposer's replica id.
pub const ID_BITS: u32 = 4;

/// Largest number of replicas whose ids fit in [`ID_BITS`].
pub const MAX_REPLICAS: u32 = 1 << ID_BITS;

/// Totally ordered round identifier: `(counter << ID_BITS) | replica_id`.
///
/// Comparing two numbers compares counters first and breaks ties with the
/// replica id, so numbers from different replicas never collide.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalNumber(u64);

impl ProposalNumber {
    /// Packs a logical counter and a replica id.
    pub fn new(counter: u64, replica_id: u32) -> Self {
        debug_assert!(replica_id < MAX_REPLICAS);
        ProposalNumber((counter << ID_BITS) | u64::from(replica_id))
    }

    /// The logical counter part.
    pub fn counter(self) -> u64 {
        self.0 >> ID_BITS
    }

    /// The id of the replica that issued this number.
    pub fn replica_id(self) -> u32 {
        (self.0 & u64::from(MAX_REPLICAS - 1)) as u32
    }

    /// The packed value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProposalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues strictly increasing proposal numbers for one replica.
#[derive(Debug)]
pub struct ProposalNumberGenerator {
    replica_id: u32,
    counter: AtomicU64,
}

impl ProposalNumberGenerator {
    /// Creates a generator whose counter starts at the current wall-clock
    /// time in milliseconds.
    pub fn new(replica_id: u32) -> Result<Self> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::with_counter(replica_id, now)
    }

    /// Creates a generator whose first number uses counter `start + 1`.
    pub fn with_counter(replica_id: u32, start: u64) -> Result<Self> {
        if replica_id >= MAX_REPLICAS {
            return Err(Error::InvalidConfig(format!(
                "replica id {} does not fit in {} bits",
                replica_id, ID_BITS
            )));
        }
        Ok(Self {
            replica_id,
            counter: AtomicU64::new(start),
        })
    }

    /// Returns the next number. Safe to call from concurrent rounds.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> ProposalNumber {
        let logical = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        ProposalNumber::new(logical, self.replica_id)
    }
}
