use std::time::Duration;

use tokio::sync::mpsc::Sender;

use crate::network::NetworkPackage;

/// Time a client waits for a reply before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

pub trait Client {
    fn from_server(server_id: String, net_tx: Sender<NetworkPackage>) -> Self;
}
