//! Per-peer connection handler
//!
//! Reads one framed message at a time and answers it before reading the
//! next, so replies come back in call order.

use anyhow::{Context, Result};
use common::AccessoryBridge;
use protocol::{
    ErrorCode, Message, MessagePayload, MethodResponse, ProtocolError, read_framed_async,
    validate_version, write_framed_async,
};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, split};
use tracing::{debug, warn};

/// One peer's request/reply loop
pub struct ClientConnection<S> {
    peer: SocketAddr,
    stream: S,
    bridge: AccessoryBridge,
}

impl<S> ClientConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(peer: SocketAddr, stream: S, bridge: AccessoryBridge) -> Self {
        Self {
            peer,
            stream,
            bridge,
        }
    }

    /// Serve calls until the peer closes the stream
    pub async fn run(self) -> Result<()> {
        let (mut reader, mut writer) = split(self.stream);

        loop {
            let message = match read_framed_async(&mut reader).await {
                Ok(message) => message,
                Err(ProtocolError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("Peer {} closed the stream", self.peer);
                    return Ok(());
                }
                Err(e @ ProtocolError::Serialization(_)) => {
                    warn!("Undecodable message from {}: {}", self.peer, e);
                    write_framed_async(&mut writer, &Message::new(MessagePayload::Error {
                        message: e.to_string(),
                    }))
                    .await?;
                    continue;
                }
                Err(e) => return Err(e).context("Failed to read message"),
            };

            if let Err(e) = validate_version(&message.version) {
                warn!("Rejecting message from {}: {}", self.peer, e);
                write_framed_async(&mut writer, &Message::new(MessagePayload::Error {
                    message: e.to_string(),
                }))
                .await?;
                continue;
            }

            let reply = match message.payload {
                MessagePayload::Call { id, call } => {
                    debug!("{} -> {} (request {})", self.peer, call.method, id.0);
                    let response = match self.bridge.call(call).await {
                        Ok(response) => response,
                        Err(e) => {
                            warn!("Accessory worker unavailable: {}", e);
                            MethodResponse::error(ErrorCode::Internal, e.to_string())
                        }
                    };
                    Message::reply(id, response)
                }
                other => {
                    warn!("Unexpected message from {}: {:?}", self.peer, other);
                    let err = ProtocolError::UnexpectedMessage("expected a Call message");
                    Message::new(MessagePayload::Error {
                        message: err.to_string(),
                    })
                }
            };

            write_framed_async(&mut writer, &reply)
                .await
                .context("Failed to write reply")?;
        }
    }
}
