//! Gateway process: startup, shutdown, and the serve loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use scapgate_config::AppConfig;

use crate::api::{ApiState, BasicCredentials, serve};
use crate::oscapd::{DaemonError, DbusDaemon, OscapDaemon};
use crate::translate::Translator;

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// The scapgate gateway: one daemon connection, one HTTP listener.
pub struct Gateway {
    config: AppConfig,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl Gateway {
    pub fn new(config: AppConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            shutdown_tx,
        }
    }

    /// Connect to the daemon, bind the configured address, and serve until
    /// Ctrl-C or [`Gateway::shutdown`].
    ///
    /// An unreachable daemon is fatal: nothing is bound in that case.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let daemon = DbusDaemon::connect(&self.config.daemon).await?;

        let addr = format!(
            "{}:{}",
            self.config.server.listen_addr, self.config.server.listen_port
        );
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;

        self.run_with(Arc::new(daemon), listener).await
    }

    /// Serve on an already-bound listener against any daemon implementation.
    pub async fn run_with(
        &self,
        daemon: Arc<dyn OscapDaemon>,
        listener: TcpListener,
    ) -> Result<(), GatewayError> {
        info!(
            addr = %self.config.server.listen_addr,
            port = %self.config.server.listen_port,
            bus = ?self.config.daemon.bus,
            batch_policy = ?self.config.daemon.batch_policy,
            "scapgate starting"
        );

        let translator = Translator::new(daemon).with_batch_policy(self.config.daemon.batch_policy);
        let state = Arc::new(
            ApiState::new(translator)
                .with_credentials(BasicCredentials::from_config(&self.config.auth))
                .verbose(self.config.server.debug),
        );

        let server = serve(listener, state, self.shutdown_tx.subscribe());
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                result?;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, initiating graceful shutdown");
                self.shutdown();
                server.await?;
            }
        }

        info!("scapgate stopped");
        Ok(())
    }

    /// Request a graceful shutdown of the gateway.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Errors from the gateway runtime.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
