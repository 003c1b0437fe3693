//! USB/IP TCP Server
//!
//! Binds the listening socket, accepts connections and spawns one
//! [`ClientConnection`] task per client. Tasks share nothing, so a failing
//! connection never affects the listener or its siblings.

use anyhow::{Context, Result};
use protocol::ProtocolError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{Instrument, debug, info, info_span, warn};

use super::connection::{ClientConnection, SessionEnd};
use crate::config::ServerConfig;

/// TCP server exporting the fake device
pub struct UsbIpServer {
    listener: TcpListener,
    idle_timeout: Option<Duration>,
}

impl UsbIpServer {
    /// Bind the listening socket described by `config`
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let addr = config.server.socket_addr()?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            idle_timeout: config.server.idle_timeout(),
        })
    }

    /// Address the listener is actually bound to (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Accept connections until the task is cancelled
    ///
    /// Accept failures are logged and skipped; the loop itself never returns.
    pub async fn run(self) -> Result<()> {
        info!("Waiting for connections...");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
            }

            let idle_timeout = self.idle_timeout;
            tokio::spawn(
                async move {
                    info!("Accepted connection");
                    let outcome = ClientConnection::new(stream, idle_timeout).run().await;
                    log_outcome(outcome);
                }
                .instrument(info_span!("conn", %peer)),
            );
        }
    }
}

/// Log how a connection ended; a peer hanging up is routine
fn log_outcome(outcome: Result<SessionEnd>) {
    match outcome {
        Ok(SessionEnd::DeviceListed) => info!("Connection closed after device list"),
        Err(e) if is_disconnect(&e) => info!("Connection closed by peer"),
        Err(e) => warn!("Connection terminated: {:#}", e),
    }
}

fn is_disconnect(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|c| c.downcast_ref::<ProtocolError>())
        .any(ProtocolError::is_disconnect)
}
