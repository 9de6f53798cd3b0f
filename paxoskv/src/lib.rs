#![deny(missing_docs)]
#![deny(clippy::all)]
//! Distributed KV Store based on per-key Paxos.

labrpc::service! {
    service kv_service {
        fn get(key: String) -> Option<String>;
        fn put(key: String, value: String) -> bool;
        fn delete(key: String) -> bool;
    }
}

pub use kv_service::{Client as KvClient, Server as KvServer, Service as KvService};

/// KV Store Server.
pub mod kv;

/// KV Store Client.
pub mod client;

/// Wiring replicas into a cluster.
pub mod cluster;


pub use client::{Backend, Client};
pub use kv::ReplicaServer;
