use std::sync::Arc;

use log::info;
use paxos::{Config, Peer};

use crate::ReplicaServer;

/// Builds `config.cluster_size` replicas in this process and wires every
/// proposer to every replica through direct references.
pub fn local(config: &Config) -> paxos::Result<Vec<ReplicaServer>> {
    config.validate()?;
    let replicas = (0..config.cluster_size as u32)
        .map(|i| ReplicaServer::new(i, config))
        .collect::<paxos::Result<Vec<_>>>()?;
    let peers: Vec<Arc<dyn Peer>> = replicas
        .iter()
        .map(|r| Arc::new(r.local_peer()) as Arc<dyn Peer>)
        .collect();
    for r in replicas.iter() {
        r.set_all_replicas(peers.clone());
    }
    info!("local cluster of {} replicas up", replicas.len());
    Ok(replicas)
}
