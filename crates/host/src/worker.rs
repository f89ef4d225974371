//! Accessory worker thread
//!
//! Stream calls block, so the dispatcher lives on a dedicated OS thread and
//! the Tokio side reaches it through an [`AccessoryBridge`](common::AccessoryBridge).
//! The thread takes one command at a time off the queue, which makes every
//! command atomic with respect to every other.

use crate::dispatcher::Dispatcher;
use common::{AccessoryCommand, AccessoryWorker};
use protocol::{ErrorCode, MethodCall, MethodResponse};
use std::io;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// Worker loop owning the dispatcher
pub struct AccessoryWorkerThread {
    dispatcher: Dispatcher,
    worker: AccessoryWorker,
}

impl AccessoryWorkerThread {
    pub fn new(worker: AccessoryWorker, dispatcher: Dispatcher) -> Self {
        Self { dispatcher, worker }
    }

    /// Serve commands until `Shutdown` arrives or every bridge is dropped
    pub fn run(mut self) {
        info!("Accessory worker thread started");

        loop {
            match self.worker.recv_command() {
                Ok(AccessoryCommand::Call { call, response }) => {
                    let reply = self.handle_call(&call);
                    if response.send(reply).is_err() {
                        debug!("Caller of {} went away before the reply", call.method);
                    }
                }
                Ok(AccessoryCommand::Shutdown) => {
                    info!("Shutdown command received");
                    break;
                }
                Err(e) => {
                    debug!("Command channel closed: {}", e);
                    break;
                }
            }
        }

        self.dispatcher.shutdown();
        info!("Accessory worker thread stopped");
    }

    /// Run one call; a panic becomes an `INTERNAL` error reply
    fn handle_call(&mut self, call: &MethodCall) -> MethodResponse {
        let dispatcher = &mut self.dispatcher;
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dispatcher.handle(call)))
            .unwrap_or_else(|e| {
                error!("Panic in {} handler: {:?}", call.method, e);
                MethodResponse::error(ErrorCode::Internal, "command handler panicked")
            })
    }
}

/// Spawn the worker on its own named thread
pub fn spawn_accessory_worker(
    worker: AccessoryWorker,
    dispatcher: Dispatcher,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("accessory-worker".to_string())
        .spawn(move || AccessoryWorkerThread::new(worker, dispatcher).run())
}
