//! Async channel bridge between Tokio runtime and the accessory thread
//!
//! Accessory streams block, so every command runs on one dedicated thread.
//! Connections on the Tokio side queue calls through the bridge; the worker
//! takes them one at a time, which serializes all session and transfer work.

use async_channel::{Receiver, Sender, bounded};
use protocol::{MethodCall, MethodResponse};
use tracing::debug;

/// Queue depth between the runtime and the accessory thread
const COMMAND_QUEUE_DEPTH: usize = 256;

/// Commands from Tokio runtime to the accessory thread
#[derive(Debug)]
pub enum AccessoryCommand {
    /// Dispatch a method call
    Call {
        call: MethodCall,
        /// Channel to send response back
        response: tokio::sync::oneshot::Sender<MethodResponse>,
    },

    /// Close any open session and stop the thread
    Shutdown,
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct AccessoryBridge {
    cmd_tx: Sender<AccessoryCommand>,
}

impl AccessoryBridge {
    /// Send a command to the accessory thread
    pub async fn send_command(&self, cmd: AccessoryCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Send a call and wait for its response
    pub async fn call(&self, call: MethodCall) -> crate::Result<MethodResponse> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send_command(AccessoryCommand::Call { call, response: tx })
            .await?;
        rx.await.map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Ask the accessory thread to stop
    pub async fn shutdown(&self) -> crate::Result<()> {
        debug!("Requesting accessory thread shutdown");
        self.send_command(AccessoryCommand::Shutdown).await
    }
}

/// Handle for the accessory thread (blocking)
pub struct AccessoryWorker {
    cmd_rx: Receiver<AccessoryCommand>,
}

impl AccessoryWorker {
    /// Receive a command from Tokio runtime (blocking)
    ///
    /// Fails once every bridge handle has been dropped.
    pub fn recv_command(&self) -> crate::Result<AccessoryCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<AccessoryCommand> {
        self.cmd_rx.try_recv().ok()
    }
}

/// Create the channel bridge between Tokio and the accessory thread
///
/// Returns (AccessoryBridge for Tokio, AccessoryWorker for the accessory thread)
pub fn create_accessory_bridge() -> (AccessoryBridge, AccessoryWorker) {
    let (cmd_tx, cmd_rx) = bounded(COMMAND_QUEUE_DEPTH);
    (AccessoryBridge { cmd_tx }, AccessoryWorker { cmd_rx })
}
