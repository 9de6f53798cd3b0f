/// Declares an RPC service.
///
/// ```ignore
/// labrpc::service! {
///     service echo_svc {
///         fn echo(msg: String) -> String;
///     }
/// }
/// ```
///
/// expands to a module `echo_svc` holding a `Service` trait to implement,
/// a `Server<T: Service>` that dispatches incoming packages to it and a
/// `Client` stub with one async method per declared function. Arguments
/// and results travel as JSON, so every type must be serde-serializable.
#[macro_export]
macro_rules! service {
    () => {
        compile_error!("empty service is not allowed");
    };
    (
        $(#[$service_attr:meta])*
        service $svc_name:ident {
            $(
                $(#[$method_attr:meta])*
                fn $method_name:ident($($arg_id:ident: $arg_ty:ty),*) -> $output:ty;
            )*
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$service_attr])*
        pub mod $svc_name {
            use super::*;

            use $crate::network::NetworkPackage;
            use $crate::{server, client};

            use $crate::tokio::sync::mpsc::{self, Sender, Receiver};
            use $crate::tokio::time;
            use $crate::serde_json;
            use $crate::serde::{Serialize, Deserialize};
            use $crate::anyhow::{Result, anyhow};
            use $crate::async_trait;
            use $crate::log::trace;

            #[derive(Debug, Deserialize, Serialize)]
            pub enum Request {
                $(
                    #[allow(non_camel_case_types)]
                    $method_name {  $($arg_id : $arg_ty),* }
                ),*
            }

            mod response {
                use super::*;
                $(
                    #[derive(Deserialize, Serialize)]
                    #[allow(non_camel_case_types)]
                    pub struct $method_name {
                        pub data: ::std::result::Result<$output, String>,
                    }
                )*
            }

            #[async_trait]
            pub trait Service: Send + 'static {
                $(
                    $(#[$method_attr])*
                    async fn $method_name(&mut self, $($arg_id : $arg_ty),* ) -> Result<$output>;
                )*
            }

            #[derive(Debug, Clone)]
            pub struct Client {
                server_id: String,
                tx: Sender<NetworkPackage>,
                timeout: ::std::time::Duration,
            }

            impl Client {
                /// Bounds every call made through this stub.
                pub fn with_timeout(mut self, timeout: ::std::time::Duration) -> Self {
                    self.timeout = timeout;
                    self
                }

                pub fn server_id(&self) -> &str {
                    &self.server_id
                }

                $(
                    pub async fn $method_name(&self, $($arg_id : $arg_ty),* ) -> Result<$output> {
                        let req = Request::$method_name {
                            $($arg_id),*
                        };
                        let resp = self.call(serde_json::to_string(&req)?).await?;
                        let resp: response::$method_name = serde_json::from_str(&resp)?;
                        resp.data.map_err(|e| anyhow!("{} failed on {}: {}", stringify!($method_name), self.server_id, e))
                    }
                )*

                pub async fn call(&self, req: String) -> Result<String> {
                    let (tx, mut rx) = mpsc::channel(1);
                    let package = NetworkPackage { to: self.server_id.clone(), reply: tx, data: req.clone() };
                    // Both the hand-off to the network and the wait for the
                    // reply count against the timeout.
                    let exchange = async {
                        match self.tx.send(package).await {
                            Ok(()) => rx
                                .recv()
                                .await
                                .ok_or_else(|| anyhow!("unable to receive from server {}", self.server_id)),
                            Err(_) => Err(anyhow!("network is down")),
                        }
                    };
                    match time::timeout(self.timeout, exchange).await {
                        Ok(Ok(resp)) => {
                            trace!("req: {}, resp: {}", req, &resp);
                            Ok(resp)
                        }
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(anyhow!("call to {} timed out after {:?}", self.server_id, self.timeout)),
                    }
                }
            }

            impl client::Client for Client {
                fn from_server(server_id: String, net_tx: Sender<NetworkPackage>) -> Self {
                    Self {
                        server_id,
                        tx: net_tx,
                        timeout: client::DEFAULT_TIMEOUT,
                    }
                }
            }

            pub struct Server<T: Service + Send> {
                svc: T,
                tx: Sender<NetworkPackage>,
                rx: Receiver<NetworkPackage>,
            }

            #[async_trait]
            impl<T: Service + Send> server::Server for Server<T> {
                type Service = T;

                fn from_service(svc: Self::Service) -> Self {
                    let (tx, rx) = mpsc::channel(100);
                    Self {svc, tx, rx}
                }

                fn client_chan(&self) -> Sender<NetworkPackage> {
                    self.tx.clone()
                }

                async fn handle(&mut self) -> Result<()> {
                    match self.rx.recv().await {
                        Some(NetworkPackage{to, reply, data}) => {
                            trace!("{} handle recv: {}", to, &data);
                            let req: Request = serde_json::from_str(&data)?;
                            let resp = match req {
                                $(
                                    Request::$method_name { $($arg_id),* } => {
                                        let data = self.svc.$method_name($($arg_id),* )
                                            .await
                                            .map_err(|e| e.to_string());
                                        serde_json::to_string(&response::$method_name { data })?
                                    }
                                )*
                            };
                            trace!("{} handle send: {}", to, &resp);
                            // The caller may have timed out and dropped its end.
                            if reply.send(resp).await.is_err() {
                                trace!("{} reply dropped", to);
                            }
                            Ok(())
                        }
                        None => Err(anyhow!("expected sender")),
                    }
                }
            }
        }
    };
}
