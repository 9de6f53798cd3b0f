use std::collections::HashMap;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::message::{AcceptRequest, AcceptResponse, AcceptedValue, PrepareRequest, PromiseResponse};
use crate::ProposalNumber;

/// Paxos bookkeeping for one key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    /// Highest proposal promised.
    pub promised: Option<ProposalNumber>,
    /// Highest proposal accepted, with its value.
    pub accepted: Option<AcceptedValue>,
}

/// Votes on proposals, one independent single-decree instance per key.
///
/// Entries are created on the first prepare or accept for a key and erased
/// once a learner has applied the decision, so memory tracks in-flight keys
/// only. All operations on one acceptor are serialized.
#[derive(Debug)]
pub struct Acceptor {
    id: u32,
    keys: Mutex<HashMap<String, KeyState>>,
}

impl Acceptor {
    /// Creates an acceptor with no per-key state.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Id of the replica this acceptor belongs to.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Promises `req.proposal` if it is above every proposal promised for the
    /// key so far. The promise carries the value accepted earlier, if any.
    pub fn receive_prepare(&self, req: &PrepareRequest) -> Option<PromiseResponse> {
        let mut keys = self.keys.lock();
        let state = keys.entry(req.key.clone()).or_default();
        if state.promised.map_or(false, |promised| req.proposal <= promised) {
            debug!(
                "acceptor {} rejected prepare {} for key [{}], promised {:?}",
                self.id, req.proposal, req.key, state.promised
            );
            return None;
        }
        state.promised = Some(req.proposal);
        debug!(
            "acceptor {} promised {} for key [{}]",
            self.id, req.proposal, req.key
        );
        Some(PromiseResponse {
            proposal: req.proposal,
            accepted: state.accepted.clone(),
        })
    }

    /// Accepts `req.action` unless a higher proposal was promised for its key.
    pub fn receive_accept(&self, req: &AcceptRequest) -> Option<AcceptResponse> {
        let key = req.action.key();
        let mut keys = self.keys.lock();
        let state = keys.entry(key.to_owned()).or_default();
        if state.promised.map_or(false, |promised| req.proposal < promised) {
            debug!(
                "acceptor {} rejected accept {} for key [{}], promised {:?}",
                self.id, req.proposal, key, state.promised
            );
            return None;
        }
        state.accepted = Some(AcceptedValue {
            proposal: req.proposal,
            action: req.action.clone(),
        });
        debug!(
            "acceptor {} accepted {} for key [{}]",
            self.id, req.proposal, key
        );
        Some(AcceptResponse {
            proposal: req.proposal,
            action: req.action.clone(),
        })
    }

    /// Forgets everything about `key`.
    pub fn clear_state_for_key(&self, key: &str) {
        if self.keys.lock().remove(key).is_some() {
            trace!("acceptor {} cleared state for key [{}]", self.id, key);
        }
    }

    /// Snapshot of the state held for `key`.
    pub fn state_for(&self, key: &str) -> Option<KeyState> {
        self.keys.lock().get(key).cloned()
    }

    /// Number of keys with live state.
    pub fn tracked_keys(&self) -> usize {
        self.keys.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Action;

    fn prepare(n: u64, key: &str) -> PrepareRequest {
        PrepareRequest {
            proposal: ProposalNumber::new(n, 0),
            key: key.to_owned(),
            proposer_id: 0,
        }
    }

    fn accept(n: u64, action: Action) -> AcceptRequest {
        AcceptRequest {
            proposal: ProposalNumber::new(n, 0),
            proposer_id: 0,
            action,
        }
    }

    #[test]
    fn test_promise_only_higher() {
        let a = Acceptor::new(0);
        let p = a.receive_prepare(&prepare(5, "k")).unwrap();
        assert_eq!(p.proposal, ProposalNumber::new(5, 0));
        assert!(p.accepted.is_none());

        // Equal and lower proposals are rejected.
        assert!(a.receive_prepare(&prepare(5, "k")).is_none());
        assert!(a.receive_prepare(&prepare(4, "k")).is_none());
        assert!(a.receive_prepare(&prepare(6, "k")).is_some());

        // Keys are independent.
        assert!(a.receive_prepare(&prepare(1, "other")).is_some());
    }

    #[test]
    fn test_accept_at_or_above_promise() {
        let a = Acceptor::new(0);
        a.receive_prepare(&prepare(5, "k")).unwrap();
        assert!(a.receive_accept(&accept(4, Action::put("k", "old"))).is_none());
        assert!(a.receive_accept(&accept(5, Action::put("k", "v"))).is_some());

        let state = a.state_for("k").unwrap();
        assert_eq!(state.promised, Some(ProposalNumber::new(5, 0)));
        assert_eq!(state.accepted.unwrap().action, Action::put("k", "v"));

        // Without a promise any proposal is accepted.
        assert!(a.receive_accept(&accept(1, Action::delete("fresh"))).is_some());
    }

    #[test]
    fn test_promise_reports_accepted() {
        let a = Acceptor::new(0);
        a.receive_accept(&accept(3, Action::put("k", "v"))).unwrap();
        let p = a.receive_prepare(&prepare(7, "k")).unwrap();
        let accepted = p.accepted.unwrap();
        assert_eq!(accepted.proposal, ProposalNumber::new(3, 0));
        assert_eq!(accepted.action, Action::put("k", "v"));
    }

    #[test]
    fn test_clear() {
        let a = Acceptor::new(0);
        a.receive_prepare(&prepare(5, "a")).unwrap();
        a.receive_accept(&accept(5, Action::put("b", "1"))).unwrap();
        assert_eq!(a.tracked_keys(), 2);

        a.clear_state_for_key("a");
        assert_eq!(a.tracked_keys(), 1);
        assert!(a.state_for("a").is_none());

        // A cleared key starts over.
        assert!(a.receive_prepare(&prepare(1, "a")).is_some());
    }
}
