use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use futures::Future;
use log::{debug, info, warn};
use rand::Rng;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::{client::Client, server::Server};

#[derive(Debug, Clone)]
pub struct NetworkPackage {
    pub to: String,
    pub reply: Sender<String>,
    pub data: String,
}

/// Fault knobs shared between a running [`Network`] and the test driving it.
#[derive(Debug, Clone, Default)]
pub struct Faults(Arc<Mutex<FaultState>>);

#[derive(Debug, Default)]
struct FaultState {
    unreachable: HashSet<String>,
    drop_rate: f32,
}

impl Faults {
    /// Cuts a node off (or reconnects it). Packages to an unreachable node
    /// are dropped, so its callers see an error instead of a reply.
    pub fn set_reachable(&self, id: &str, reachable: bool) {
        let mut state = self.0.lock().unwrap();
        if reachable {
            state.unreachable.remove(id);
        } else {
            state.unreachable.insert(id.to_owned());
        }
    }

    /// Probability in `[0, 1]` that any package is silently dropped.
    pub fn set_drop_rate(&self, rate: f32) {
        self.0.lock().unwrap().drop_rate = rate.max(0.0).min(1.0);
    }

    fn should_drop(&self, to: &str) -> bool {
        let state = self.0.lock().unwrap();
        if state.unreachable.contains(to) {
            return true;
        }
        state.drop_rate > 0.0 && rand::thread_rng().gen_range(0.0..1.0) < state.drop_rate
    }
}

pub struct Network {
    pub tx: Sender<NetworkPackage>,
    rx: Receiver<NetworkPackage>,
    pub nodes: Arc<Mutex<HashMap<String, Sender<NetworkPackage>>>>,
    faults: Faults,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(100);
        Self {
            tx,
            rx,
            nodes: Arc::new(Mutex::new(HashMap::default())),
            faults: Faults::default(),
        }
    }

    pub fn faults(&self) -> Faults {
        self.faults.clone()
    }

    /// Registers a node named `id` and returns a client stub for it together
    /// with the server routine to spawn. The node is routable as soon as this
    /// returns. `f` builds the service, and is called again whenever the
    /// server loop fails.
    pub fn register_service<S, C, F, V>(
        &self,
        id: String,
        f: F,
    ) -> (C, impl Future<Output = ()> + Send)
    where
        F: Fn() -> V + Send + 'static,
        S: Server<Service = V> + Send + 'static,
        C: Client,
    {
        let client = C::from_server(id.clone(), self.tx.clone());
        let mut server = S::from_service(f());
        self.nodes
            .lock()
            .unwrap()
            .insert(id.clone(), server.client_chan());
        let nodes = self.nodes.clone();
        (client, async move {
            loop {
                match server.run().await {
                    Ok(()) => break,
                    Err(e) => {
                        info!("server {} restart: {}", id, e);
                        server = S::from_service(f());
                        nodes
                            .lock()
                            .unwrap()
                            .insert(id.clone(), server.client_chan());
                    }
                }
            }
        })
    }

    pub async fn run(&mut self) {
        while let Some(p) = self.rx.recv().await {
            if self.faults.should_drop(&p.to) {
                debug!("package to {} dropped", p.to);
                continue;
            }
            let node = {
                let x = self.nodes.lock().unwrap();
                x.get(&p.to).cloned()
            };

            if let Some(x) = node {
                if x.send(p).await.is_err() {
                    warn!("send to node failed, dropped");
                }
            } else {
                warn!("node {} not found", p.to);
            }
        }
    }
}
