//! TCP command server
//!
//! Accepts connections and spawns a [`ClientConnection`] task for each.

use anyhow::{Context, Result};
use common::AccessoryBridge;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::connection::ClientConnection;

/// Listener forwarding peer calls to the accessory worker
pub struct CommandServer {
    listener: TcpListener,
    bridge: AccessoryBridge,
}

impl CommandServer {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, bridge: AccessoryBridge) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Command server bound to {}", listener.local_addr()?);
        Ok(Self { listener, bridge })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> Result<()> {
        info!("Server running, waiting for connections...");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
            }

            let bridge = self.bridge.clone();
            tokio::spawn(async move {
                info!("Accepted connection from: {}", peer);
                let connection = ClientConnection::new(peer, stream, bridge);
                if let Err(e) = connection.run().await {
                    error!("Connection error ({}): {:#}", peer, e);
                }
                info!("Connection closed: {}", peer);
            });
        }
    }
}
