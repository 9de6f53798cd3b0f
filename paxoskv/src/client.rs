use super::{KvClient, ReplicaServer};

use std::sync::atomic::{AtomicUsize, Ordering};

use labrpc::anyhow::{anyhow, Result};
use log::debug;

/// Something that serves the client-facing operations of one replica.
#[labrpc::async_trait]
pub trait Backend: Send + Sync {
    /// Reads `key` on the replica.
    async fn get(&self, key: String) -> Result<Option<String>>;
    /// Writes `key` through the replica.
    async fn put(&self, key: String, value: String) -> Result<bool>;
    /// Deletes `key` through the replica.
    async fn delete(&self, key: String) -> Result<bool>;
}

#[labrpc::async_trait]
impl Backend for ReplicaServer {
    async fn get(&self, key: String) -> Result<Option<String>> {
        Ok(ReplicaServer::get(self, &key))
    }

    async fn put(&self, key: String, value: String) -> Result<bool> {
        Ok(ReplicaServer::put(self, &key, &value).await)
    }

    async fn delete(&self, key: String) -> Result<bool> {
        Ok(ReplicaServer::delete(self, &key).await)
    }
}

#[labrpc::async_trait]
impl Backend for KvClient {
    async fn get(&self, key: String) -> Result<Option<String>> {
        KvClient::get(self, key).await
    }

    async fn put(&self, key: String, value: String) -> Result<bool> {
        KvClient::put(self, key, value).await
    }

    async fn delete(&self, key: String) -> Result<bool> {
        KvClient::delete(self, key).await
    }
}

/// Client for a KV cluster, spreading requests over its replicas in
/// round-robin order.
pub struct Client<B> {
    backends: Vec<B>,
    next: AtomicUsize,
}

impl<B: Backend> Client<B> {
    /// Create a new client from one backend per replica.
    pub fn new(backends: Vec<B>) -> Result<Self> {
        if backends.is_empty() {
            return Err(anyhow!("client needs at least one replica"));
        }
        Ok(Self {
            backends,
            next: AtomicUsize::new(0),
        })
    }

    fn pick(&self) -> &B {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.backends.len();
        debug!("client routing to backend {}", i);
        &self.backends[i]
    }

    /// Reads `key` from the next replica.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.pick().get(key.to_owned()).await
    }

    /// Writes `key` through the next replica.
    pub async fn put(&self, key: &str, value: &str) -> Result<bool> {
        self.pick().put(key.to_owned(), value.to_owned()).await
    }

    /// Deletes `key` through the next replica.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.pick().delete(key.to_owned()).await
    }

    /// Every backend, in routing order.
    pub fn backends(&self) -> &[B] {
        &self.backends
    }
}
