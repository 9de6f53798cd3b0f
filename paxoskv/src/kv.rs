use super::KvService;

use std::sync::Arc;

use labrpc::anyhow::Result;
use log::{info, warn};
use paxos::{
    AcceptorSupervisor, Action, Config, Learner, LocalPeer, Peer, ProposalNumber, Proposer, Store,
};

/// One replica of the store: a supervised acceptor, a learner, a proposer
/// and the key-value map the learner writes to.
///
/// Cloning is cheap and every clone is the same replica.
#[derive(Clone)]
pub struct ReplicaServer {
    id: u32,
    supervisor: Arc<AcceptorSupervisor>,
    learner: Arc<Learner>,
    proposer: Arc<Proposer>,
    store: Store,
}

impl ReplicaServer {
    /// Creates replica `id`. It cannot serve writes until
    /// [`set_all_replicas`](Self::set_all_replicas) is called.
    pub fn new(id: u32, config: &Config) -> paxos::Result<Self> {
        config.validate()?;
        let store = Store::default();
        let supervisor = Arc::new(AcceptorSupervisor::new(id, config.crash, config.seed));
        let learner = Arc::new(Learner::new(id, store.clone(), supervisor.clone()));
        let proposer = Arc::new(Proposer::new(id, config.clone())?);
        info!("replica {} created", id);
        Ok(Self {
            id,
            supervisor,
            learner,
            proposer,
            store,
        })
    }

    /// Replica id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Reads the local map. No round is run, so the value may lag behind
    /// writes still being learned.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.read().get(key).cloned()
    }

    /// Writes `key` through consensus. Returns whether the write was
    /// committed.
    pub async fn put(&self, key: &str, value: &str) -> bool {
        self.try_put(key, value).await.is_ok()
    }

    /// Deletes `key` through consensus. Returns whether the delete was
    /// committed.
    pub async fn delete(&self, key: &str) -> bool {
        self.try_delete(key).await.is_ok()
    }

    /// Like [`put`](Self::put) but tells why a write failed.
    pub async fn try_put(&self, key: &str, value: &str) -> paxos::Result<ProposalNumber> {
        self.submit(Action::put(key, value)).await
    }

    /// Like [`delete`](Self::delete) but tells why a delete failed.
    pub async fn try_delete(&self, key: &str) -> paxos::Result<ProposalNumber> {
        self.submit(Action::delete(key)).await
    }

    async fn submit(&self, action: Action) -> paxos::Result<ProposalNumber> {
        let res = self.proposer.propose(action.clone()).await;
        if let Err(e) = &res {
            warn!("replica {} failed to commit {}: {}", self.id, action, e);
        }
        res
    }

    /// Supervisor of this replica's acceptor.
    pub fn acceptor_supervisor(&self) -> &Arc<AcceptorSupervisor> {
        &self.supervisor
    }

    /// Learner of this replica.
    pub fn learner(&self) -> &Arc<Learner> {
        &self.learner
    }

    /// Snapshot of the local map.
    pub fn dump(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .store
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    /// Peer reaching this replica's roles directly.
    pub fn local_peer(&self) -> LocalPeer {
        LocalPeer::new(self.id, self.supervisor.clone(), self.learner.clone())
    }

    /// Tells this replica's proposer which replicas form the cluster, this
    /// one included.
    pub fn set_all_replicas(&self, peers: Vec<Arc<dyn Peer>>) {
        self.proposer.set_peers(peers);
    }
}

#[labrpc::async_trait]
impl KvService for ReplicaServer {
    async fn get(&mut self, key: String) -> Result<Option<String>> {
        Ok(ReplicaServer::get(self, &key))
    }

    async fn put(&mut self, key: String, value: String) -> Result<bool> {
        Ok(ReplicaServer::put(self, &key, &value).await)
    }

    async fn delete(&mut self, key: String) -> Result<bool> {
        Ok(ReplicaServer::delete(self, &key).await)
    }
}
