//! A live gateway on an ephemeral port.
//!
//! [`TestGateway`] runs the full HTTP stack against a [`FakeDaemon`] so that
//! tests can drive it with a real HTTP client.

use std::net::SocketAddr;
use std::sync::Arc;

use scapgate_config::AppConfig;
use scapgate_core::{Gateway, GatewayError};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::fake_daemon::FakeDaemon;

pub struct TestGateway {
    pub daemon: Arc<FakeDaemon>,
    addr: SocketAddr,
    gateway: Arc<Gateway>,
    handle: JoinHandle<Result<(), GatewayError>>,
}

impl TestGateway {
    /// Start a gateway on `127.0.0.1:0` with `config`, backed by `daemon`.
    pub async fn start(config: AppConfig, daemon: Arc<FakeDaemon>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("listener has no address");

        let gateway = Arc::new(Gateway::new(config));
        let handle = tokio::spawn({
            let gateway = gateway.clone();
            let daemon = daemon.clone();
            async move { gateway.run_with(daemon, listener).await }
        });

        Self {
            daemon,
            addr,
            gateway,
            handle,
        }
    }

    /// `http://127.0.0.1:<port>` followed by `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Request a graceful shutdown and wait for the server to stop.
    pub async fn shutdown(self) {
        self.gateway.shutdown();
        self.handle
            .await
            .expect("gateway task panicked")
            .expect("gateway returned an error");
    }
}
