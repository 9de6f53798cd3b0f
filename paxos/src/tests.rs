use crate::message::{AcceptRequest, AcceptResponse, LearnMessage, PrepareRequest, PromiseResponse};
use crate::{
    AcceptorSupervisor, Config, Learner, LocalPeer, Peer, Proposer, RemotePeer, RoleClient,
    RoleServer, Store,
};

use labrpc::{anyhow::Result, Faults, Network};
use std::sync::Arc;
use std::time::Duration;

/// Roles of every replica of a cluster, indexed by replica id.
pub struct RoleCluster {
    /// One supervisor per replica.
    pub supervisors: Vec<Arc<AcceptorSupervisor>>,
    /// One learner per replica.
    pub learners: Vec<Arc<Learner>>,
    /// One proposer per replica, not yet wired.
    pub proposers: Vec<Arc<Proposer>>,
}

impl RoleCluster {
    /// Builds `config.cluster_size` replicas.
    pub fn new(config: &Config) -> crate::Result<Self> {
        config.validate()?;
        let mut cluster = RoleCluster {
            supervisors: Vec::new(),
            learners: Vec::new(),
            proposers: Vec::new(),
        };
        for i in 0..config.cluster_size as u32 {
            let supervisor = Arc::new(AcceptorSupervisor::new(i, config.crash, config.seed));
            let learner = Arc::new(Learner::new(i, Store::default(), supervisor.clone()));
            cluster.supervisors.push(supervisor);
            cluster.learners.push(learner);
            cluster.proposers.push(Arc::new(Proposer::new(i, config.clone())?));
        }
        Ok(cluster)
    }

    /// In-process peers for every replica.
    pub fn local_peers(&self) -> Vec<LocalPeer> {
        self.supervisors
            .iter()
            .zip(self.learners.iter())
            .enumerate()
            .map(|(i, (s, l))| LocalPeer::new(i as u32, s.clone(), l.clone()))
            .collect()
    }

    /// Wires every proposer to `peers`.
    pub fn wire(&self, peers: Vec<Arc<dyn Peer>>) {
        for p in self.proposers.iter() {
            p.set_peers(peers.clone());
        }
    }

    /// Wires every proposer to in-process peers.
    pub fn wire_local(&self) {
        let peers = self
            .local_peers()
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn Peer>)
            .collect();
        self.wire(peers);
    }

    /// Value of `key` on every replica.
    pub fn values(&self, key: &str) -> Vec<Option<String>> {
        self.learners
            .iter()
            .map(|l| l.store().read().get(key).cloned())
            .collect()
    }
}

/// Serves the roles of every replica on a fresh network and returns remote
/// peers for them, plus the knobs to break the network.
pub fn serve_roles(cluster: &RoleCluster, timeout: Duration) -> (Vec<Arc<dyn Peer>>, Faults) {
    let mut net = Network::new();
    let mut peers: Vec<Arc<dyn Peer>> = Vec::new();
    for (i, local) in cluster.local_peers().into_iter().enumerate() {
        let (client, routine) = net
            .register_service::<RoleServer<LocalPeer>, RoleClient, _, _>(
                role_id(i),
                move || local.clone(),
            );
        tokio::spawn(routine);
        peers.push(Arc::new(RemotePeer::new(i as u32, client, timeout)));
    }
    let faults = net.faults();
    tokio::spawn(async move {
        net.run().await;
    });
    (peers, faults)
}

/// Network name of replica `i`'s roles.
pub fn role_id(i: usize) -> String {
    format!("role-{}", i)
}

/// A peer whose learner never hears anything, so acceptor state is never
/// cleared and every round on a key joins the same Paxos instance.
pub struct Deaf(pub Arc<dyn Peer>);

#[labrpc::async_trait]
impl Peer for Deaf {
    fn id(&self) -> u32 {
        self.0.id()
    }
    async fn prepare(&self, req: PrepareRequest) -> Result<Option<PromiseResponse>> {
        self.0.prepare(req).await
    }
    async fn accept(&self, req: AcceptRequest) -> Result<Option<AcceptResponse>> {
        self.0.accept(req).await
    }
    async fn learn(&self, _msg: LearnMessage) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
fn quiet() -> Config {
    Config::default().with_crash(None)
}

#[tokio::test]
async fn test_put_reaches_every_replica() {
    init_logger();
    let cluster = RoleCluster::new(&quiet()).unwrap();
    cluster.wire_local();

    cluster.proposers[0]
        .propose(crate::Action::put("a", "1"))
        .await
        .unwrap();
    assert!(cluster.values("a").iter().all(|v| v.as_deref() == Some("1")));

    cluster.proposers[2]
        .propose(crate::Action::delete("a"))
        .await
        .unwrap();
    assert!(cluster.values("a").iter().all(|v| v.is_none()));

    // Learning cleared every acceptor.
    for s in cluster.supervisors.iter() {
        assert_eq!(s.current_acceptor().unwrap().tracked_keys(), 0);
    }
}

#[tokio::test]
async fn test_two_crashed_acceptors_are_tolerated() {
    init_logger();
    let cluster = RoleCluster::new(&quiet()).unwrap();
    cluster.wire_local();
    cluster.supervisors[1].crash();
    cluster.supervisors[4].crash();

    cluster.proposers[0]
        .propose(crate::Action::put("k", "v"))
        .await
        .unwrap();
    assert!(cluster.values("k").iter().all(|v| v.as_deref() == Some("v")));
}

#[tokio::test]
async fn test_no_quorum_no_side_effects() {
    init_logger();
    let cluster = RoleCluster::new(&quiet()).unwrap();
    cluster.wire_local();
    for i in 0..3 {
        cluster.supervisors[i].crash();
    }

    let err = cluster.proposers[3]
        .propose(crate::Action::put("k", "v"))
        .await
        .unwrap_err();
    match err {
        crate::Error::QuorumNotReached {
            phase,
            responses,
            majority,
        } => {
            assert_eq!(phase, crate::Phase::Prepare);
            assert_eq!(responses, 2);
            assert_eq!(majority, 3);
        }
        e => panic!("unexpected error: {}", e),
    }
    assert!(cluster.values("k").iter().all(|v| v.is_none()));
    for s in cluster.supervisors.iter() {
        let state = s.current_acceptor().unwrap().state_for("k");
        assert!(state.map_or(true, |s| s.accepted.is_none()));
    }
}

#[tokio::test]
async fn test_piggybacked_value_wins_the_round() {
    init_logger();
    let cluster = RoleCluster::new(&quiet().with_max_rounds(1)).unwrap();
    cluster.wire_local();

    // Replica 3 accepted an old write for the key that was never learned.
    let old = crate::Action::put("k", "old");
    cluster.supervisors[3]
        .current_acceptor()
        .unwrap()
        .receive_accept(&AcceptRequest {
            proposal: crate::ProposalNumber::new(1, 3),
            proposer_id: 3,
            action: old,
        })
        .unwrap();

    let err = cluster.proposers[0]
        .propose(crate::Action::put("k", "new"))
        .await
        .unwrap_err();
    assert!(matches!(err, crate::Error::Exhausted { rounds: 1 }));
    assert!(cluster.values("k").iter().all(|v| v.as_deref() == Some("old")));

    // A second round is free to commit the caller's own value.
    cluster.proposers[0]
        .propose(crate::Action::put("k", "new"))
        .await
        .unwrap();
    assert!(cluster.values("k").iter().all(|v| v.as_deref() == Some("new")));
}

#[tokio::test]
async fn test_preempted_write_is_reproposed() {
    init_logger();
    let cluster = RoleCluster::new(&quiet()).unwrap();
    cluster.wire_local();
    cluster.supervisors[0]
        .current_acceptor()
        .unwrap()
        .receive_accept(&AcceptRequest {
            proposal: crate::ProposalNumber::new(1, 4),
            proposer_id: 4,
            action: crate::Action::delete("k"),
        })
        .unwrap();

    cluster.proposers[1]
        .propose(crate::Action::put("k", "mine"))
        .await
        .unwrap();
    assert!(cluster.values("k").iter().all(|v| v.as_deref() == Some("mine")));
    // The recovered delete and the caller's put were both learned.
    assert!(cluster.learners.iter().all(|l| l.applied_count() == 2));
}

#[cfg(test)]
fn one_check() -> Config {
    Config::default().with_crash(Some(crate::CrashSimulation {
        min_checks: 1,
        max_checks: 1,
        recovery_delay: 0,
    }))
}

#[tokio::test]
async fn test_strict_accept_shortfall_aborts() {
    init_logger();
    // Every acceptor answers the prepare and crashes on the accept.
    let cluster = RoleCluster::new(&one_check()).unwrap();
    cluster.wire_local();

    let err = cluster.proposers[0]
        .propose(crate::Action::put("k", "v"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        crate::Error::QuorumNotReached {
            phase: crate::Phase::Accept,
            responses: 0,
            majority: 3,
        }
    ));
    assert!(cluster.values("k").iter().all(|v| v.is_none()));
    // One round plus its retry, each crashing every acceptor once.
    assert!(cluster.supervisors.iter().all(|s| s.generation() == 3));
}

#[tokio::test]
async fn test_degraded_accept_shortfall_learns_anyway() {
    init_logger();
    let config = one_check().with_accept_shortfall(crate::AcceptShortfall::Degraded);
    let cluster = RoleCluster::new(&config).unwrap();
    cluster.wire_local();

    let err = cluster.proposers[0]
        .propose(crate::Action::put("k", "v"))
        .await
        .unwrap_err();
    assert!(matches!(err, crate::Error::Degraded { accepted: 0, .. }));
    assert!(cluster.values("k").iter().all(|v| v.as_deref() == Some("v")));
}

#[tokio::test]
async fn test_unwired_proposer() {
    let proposer = Proposer::new(0, Config::default()).unwrap();
    assert!(matches!(
        proposer.propose(crate::Action::delete("k")).await,
        Err(crate::Error::Unwired)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_single_key_safety() {
    init_logger();
    let cluster = Arc::new(RoleCluster::new(&quiet()).unwrap());
    let peers: Vec<Arc<dyn Peer>> = cluster
        .local_peers()
        .into_iter()
        .map(|p| Arc::new(Deaf(Arc::new(p))) as Arc<dyn Peer>)
        .collect();
    cluster.wire(peers);

    let mut rounds = Vec::new();
    for i in 0..cluster.proposers.len() {
        let proposer = cluster.proposers[i].clone();
        rounds.push(tokio::spawn(async move {
            proposer
                .run_round(&crate::Action::put("k", format!("p[{}]", i)))
                .await
        }));
    }
    let mut chosen = Vec::new();
    for r in rounds {
        if let Ok(decision) = r.await.unwrap() {
            chosen.push(decision.action);
        }
    }

    // A late round without contention must find whatever was chosen.
    let late = crate::Action::put("k", "late");
    let mut decision = None;
    for _ in 0..1000 {
        if let Ok(d) = cluster.proposers[0].run_round(&late).await {
            decision = Some(d);
            break;
        }
    }
    let decision = decision.expect("uncontended round should succeed");
    for action in chosen.iter() {
        assert_eq!(*action, decision.action);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_random_crashes() {
    init_logger();
    let cluster = RoleCluster::new(&Config::default().with_seed(7)).unwrap();
    cluster.wire_local();

    for i in 0..20 {
        let key = format!("key-{}", i);
        let action = crate::Action::put(key.clone(), format!("value-{}", i));
        let mut done = false;
        for _ in 0..100 {
            if cluster.proposers[i % 5].propose(action.clone()).await.is_ok() {
                done = true;
                break;
            }
        }
        assert!(done, "{} never committed", key);
        let expected = format!("value-{}", i);
        assert!(cluster
            .values(&key)
            .iter()
            .all(|v| v.as_deref() == Some(expected.as_str())));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_remote_roles() {
    init_logger();
    let cluster = RoleCluster::new(&quiet()).unwrap();
    let (peers, faults) = serve_roles(&cluster, Duration::from_millis(500));
    cluster.wire(peers);

    cluster.proposers[0]
        .propose(crate::Action::put("a", "1"))
        .await
        .unwrap();
    assert!(cluster.values("a").iter().all(|v| v.as_deref() == Some("1")));

    // Two unreachable replicas are tolerated, though they miss the update.
    faults.set_reachable(&role_id(3), false);
    faults.set_reachable(&role_id(4), false);
    cluster.proposers[1]
        .propose(crate::Action::put("a", "2"))
        .await
        .unwrap();
    let values = cluster.values("a");
    assert!(values[..3].iter().all(|v| v.as_deref() == Some("2")));
    assert!(values[3..].iter().all(|v| v.as_deref() == Some("1")));

    // A third one is not.
    faults.set_reachable(&role_id(2), false);
    assert!(cluster.proposers[1]
        .propose(crate::Action::put("a", "3"))
        .await
        .is_err());
}
