use std::sync::Arc;

use log::{info, trace, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::CrashSimulation;
use crate::Acceptor;

/// Liveness of the supervised acceptor.
#[derive(Debug)]
enum Lease {
    /// Serving. `remaining` successful checks are left before it crashes,
    /// `None` when crashes are not simulated.
    Live {
        acceptor: Arc<Acceptor>,
        remaining: Option<u32>,
    },
    /// Crashed, and stays down for `remaining` more checks.
    Down { remaining: u32 },
}

#[derive(Debug)]
struct Inner {
    lease: Lease,
    rng: StdRng,
    generation: u64,
}

/// Owns the acceptor of one replica and simulates it crashing and coming
/// back with empty state.
#[derive(Debug)]
pub struct AcceptorSupervisor {
    id: u32,
    crash: Option<CrashSimulation>,
    inner: Mutex<Inner>,
}

impl AcceptorSupervisor {
    /// Starts a supervisor with a fresh acceptor. `seed` makes crash
    /// countdowns reproducible. A reversed check range is read as its
    /// bounds swapped.
    pub fn new(id: u32, crash: Option<CrashSimulation>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(id))),
            None => StdRng::from_entropy(),
        };
        let mut inner = Inner {
            lease: Lease::Down { remaining: 0 },
            rng,
            generation: 0,
        };
        Self::install(id, crash.as_ref(), &mut inner);
        Self {
            id,
            crash,
            inner: Mutex::new(inner),
        }
    }

    /// Returns the acceptor if it is up, spending one check of its budget.
    ///
    /// The check that finds the budget exhausted reports the acceptor as
    /// crashed and returns `None`; the replacement is installed on that same
    /// check, or after `recovery_delay` more checks.
    pub fn live_acceptor(&self) -> Option<Arc<Acceptor>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &mut inner.lease {
            Lease::Live { acceptor, remaining } => match remaining {
                Some(0) => {
                    warn!("acceptor {} FAILED", self.id);
                    let delay = self.crash.map_or(0, |c| c.recovery_delay);
                    if delay == 0 {
                        Self::install(self.id, self.crash.as_ref(), inner);
                    } else {
                        inner.lease = Lease::Down { remaining: delay };
                    }
                    None
                }
                Some(n) => {
                    *n -= 1;
                    trace!("acceptor {} responding, checks left: {}", self.id, n);
                    Some(acceptor.clone())
                }
                None => Some(acceptor.clone()),
            },
            Lease::Down { remaining } => {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    Self::install(self.id, self.crash.as_ref(), inner);
                }
                None
            }
        }
    }

    /// Returns the acceptor without spending budget or triggering a crash.
    pub fn current_acceptor(&self) -> Option<Arc<Acceptor>> {
        match &self.inner.lock().lease {
            Lease::Live { acceptor, .. } => Some(acceptor.clone()),
            Lease::Down { .. } => None,
        }
    }

    /// Replaces the acceptor right away with a fresh one.
    pub fn reset_acceptor(&self) {
        Self::install(self.id, self.crash.as_ref(), &mut self.inner.lock());
    }

    /// Makes the next live check discover a crash.
    pub fn crash(&self) {
        if let Lease::Live { remaining, .. } = &mut self.inner.lock().lease {
            *remaining = Some(0);
        }
    }

    /// Number of acceptor instances started so far, the first included.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    fn install(id: u32, crash: Option<&CrashSimulation>, inner: &mut Inner) {
        let remaining = crash.map(|c| {
            let (lo, hi) = if c.min_checks <= c.max_checks {
                (c.min_checks, c.max_checks)
            } else {
                (c.max_checks, c.min_checks)
            };
            inner.rng.gen_range(lo..=hi)
        });
        inner.lease = Lease::Live {
            acceptor: Arc::new(Acceptor::new(id)),
            remaining,
        };
        inner.generation += 1;
        info!("acceptor {} STARTED, checks: {:?}", id, remaining);
    }
}
