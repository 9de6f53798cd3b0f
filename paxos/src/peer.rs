//! The seam between a proposer and the replicas it drives.
//!
//! A proposer only ever sees `dyn Peer`. In a single process the peers are
//! [`LocalPeer`]s holding direct references to each replica's roles; across
//! a network they are [`RemotePeer`]s calling the `role_svc` service, which
//! a `LocalPeer` on the far side serves.

use std::sync::Arc;
use std::time::Duration;

use labrpc::anyhow::Result;
use log::debug;

use crate::message::{AcceptRequest, AcceptResponse, LearnMessage, PrepareRequest, PromiseResponse};
use crate::{AcceptorSupervisor, Learner};

labrpc::service! {
    service role_svc {
        fn prepare(req: PrepareRequest) -> Option<PromiseResponse>;
        fn accept(req: AcceptRequest) -> Option<AcceptResponse>;
        fn learn(msg: LearnMessage) -> ();
    }
}

pub use role_svc::{Client as RoleClient, Server as RoleServer, Service as RoleService};

/// A replica as seen by a proposer.
///
/// `Ok(None)` means the replica answered but refused (stale proposal, or no
/// live acceptor). `Err` means it could not be reached. The proposer treats
/// both as a missing vote.
#[labrpc::async_trait]
pub trait Peer: Send + Sync {
    /// Replica id of the peer.
    fn id(&self) -> u32;
    /// Phase 1 against the peer's live acceptor.
    async fn prepare(&self, req: PrepareRequest) -> Result<Option<PromiseResponse>>;
    /// Phase 2 against the peer's live acceptor.
    async fn accept(&self, req: AcceptRequest) -> Result<Option<AcceptResponse>>;
    /// Phase 3 against the peer's learner.
    async fn learn(&self, msg: LearnMessage) -> Result<()>;
}

/// Direct access to a replica living in this process.
#[derive(Debug, Clone)]
pub struct LocalPeer {
    id: u32,
    supervisor: Arc<AcceptorSupervisor>,
    learner: Arc<Learner>,
}

impl LocalPeer {
    /// Wraps the roles of replica `id`.
    pub fn new(id: u32, supervisor: Arc<AcceptorSupervisor>, learner: Arc<Learner>) -> Self {
        Self {
            id,
            supervisor,
            learner,
        }
    }
}

#[labrpc::async_trait]
impl Peer for LocalPeer {
    fn id(&self) -> u32 {
        self.id
    }

    async fn prepare(&self, req: PrepareRequest) -> Result<Option<PromiseResponse>> {
        match self.supervisor.live_acceptor() {
            Some(acceptor) => Ok(acceptor.receive_prepare(&req)),
            None => {
                debug!("replica {} has no live acceptor for prepare {}", self.id, req.proposal);
                Ok(None)
            }
        }
    }

    async fn accept(&self, req: AcceptRequest) -> Result<Option<AcceptResponse>> {
        match self.supervisor.live_acceptor() {
            Some(acceptor) => Ok(acceptor.receive_accept(&req)),
            None => {
                debug!("replica {} has no live acceptor for accept {}", self.id, req.proposal);
                Ok(None)
            }
        }
    }

    async fn learn(&self, msg: LearnMessage) -> Result<()> {
        self.learner.learn(&msg);
        Ok(())
    }
}

#[labrpc::async_trait]
impl RoleService for LocalPeer {
    async fn prepare(&mut self, req: PrepareRequest) -> Result<Option<PromiseResponse>> {
        Peer::prepare(self, req).await
    }

    async fn accept(&mut self, req: AcceptRequest) -> Result<Option<AcceptResponse>> {
        Peer::accept(self, req).await
    }

    async fn learn(&mut self, msg: LearnMessage) -> Result<()> {
        Peer::learn(self, msg).await
    }
}

/// A replica reached through a [`RoleClient`], every call bounded by a
/// timeout.
#[derive(Debug, Clone)]
pub struct RemotePeer {
    id: u32,
    client: RoleClient,
}

impl RemotePeer {
    /// Reaches replica `id` through `client`, giving up on a call after `timeout`.
    pub fn new(id: u32, client: RoleClient, timeout: Duration) -> Self {
        Self {
            id,
            client: client.with_timeout(timeout),
        }
    }
}

#[labrpc::async_trait]
impl Peer for RemotePeer {
    fn id(&self) -> u32 {
        self.id
    }

    async fn prepare(&self, req: PrepareRequest) -> Result<Option<PromiseResponse>> {
        self.client.prepare(req).await
    }

    async fn accept(&self, req: AcceptRequest) -> Result<Option<AcceptResponse>> {
        self.client.accept(req).await
    }

    async fn learn(&self, msg: LearnMessage) -> Result<()> {
        self.client.learn(msg).await
    }
}
