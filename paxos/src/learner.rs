use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use crate::message::LearnMessage;
use crate::{AcceptorSupervisor, Action, ProposalNumber};

/// A replica's key-value map, read by GETs and written by its learner.
pub type Store = Arc<RwLock<HashMap<String, String>>>;

/// Applies chosen values to the local store.
#[derive(Debug)]
pub struct Learner {
    id: u32,
    store: Store,
    supervisor: Arc<AcceptorSupervisor>,
    /// Last proposal applied per live key; serializes learns on this replica.
    applied: Mutex<HashMap<String, ProposalNumber>>,
    count: AtomicU64,
}

impl Learner {
    /// Creates the learner of replica `id`, writing to `store`.
    pub fn new(id: u32, store: Store, supervisor: Arc<AcceptorSupervisor>) -> Self {
        Self {
            id,
            store,
            supervisor,
            applied: Mutex::new(HashMap::new()),
            count: AtomicU64::new(0),
        }
    }

    /// Applies the action in `msg` and then clears the acceptor state for its
    /// key. A put already applied is not applied again; a repeated delete
    /// finds nothing left to remove.
    pub fn learn(&self, msg: &LearnMessage) {
        let key = msg.action.key();
        let mut applied = self.applied.lock();
        if applied.get(key) == Some(&msg.proposal) {
            debug!(
                "learner {} already applied {} for key [{}]",
                self.id, msg.proposal, key
            );
        } else {
            msg.action.apply(&mut self.store.write());
            match msg.action {
                // A deleted key keeps no bookkeeping behind.
                Action::Delete { .. } => {
                    applied.remove(key);
                }
                Action::Put { .. } => {
                    applied.insert(key.to_owned(), msg.proposal);
                }
            }
            self.count.fetch_add(1, Ordering::Relaxed);
            info!(
                "learner {} applied {} from {}: {}",
                self.id, msg.proposal, msg.proposer_id, msg.action
            );
        }
        // The decision for this key is final, so its in-flight state can go.
        if let Some(acceptor) = self.supervisor.current_acceptor() {
            acceptor.clear_state_for_key(key);
        }
    }

    /// Proposal most recently applied for `key`, `None` once it was deleted.
    pub fn last_applied(&self, key: &str) -> Option<ProposalNumber> {
        self.applied.lock().get(key).copied()
    }

    /// Number of keys with applied-proposal bookkeeping.
    pub fn tracked_keys(&self) -> usize {
        self.applied.lock().len()
    }

    /// Number of actions applied so far.
    pub fn applied_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// The map this learner writes to.
    pub fn store(&self) -> &Store {
        &self.store
    }
}
