//! Session manager
//!
//! Owns the single accessory session. The state is an explicit
//! `Closed | Open(Session)` pair; only `open_device` and `close_device`
//! change it. Transfers borrow the open session through
//! [`SessionManager::active_session_mut`].

use super::registry::DeviceRegistry;
use crate::error::{AccessoryError, Result};
use crate::platform::{InputChannel, OutputChannel};
use protocol::{Accessory, AccessoryId};
use tracing::{debug, info, warn};

/// Open session with one accessory over one protocol
pub struct Session {
    accessory: Accessory,
    protocol: String,
    input: Option<Box<dyn InputChannel>>,
    output: Option<Box<dyn OutputChannel>>,
}

impl Session {
    pub fn accessory(&self) -> &Accessory {
        &self.accessory
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub(crate) fn input_mut(&mut self) -> Option<&mut (dyn InputChannel + 'static)> {
        self.input.as_deref_mut()
    }

    pub(crate) fn output_mut(&mut self) -> Option<&mut (dyn OutputChannel + 'static)> {
        self.output.as_deref_mut()
    }

    /// Close both channels, ignoring failures of already broken streams
    fn close(mut self) {
        if let Some(mut input) = self.input.take() {
            if let Err(e) = input.close() {
                warn!("Failed to close input channel of {}: {}", self.accessory.id, e);
            }
        }
        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.close() {
                warn!("Failed to close output channel of {}: {}", self.accessory.id, e);
            }
        }
    }
}

enum SessionState {
    Closed,
    Open(Session),
}

/// Owner of the at-most-one accessory session
pub struct SessionManager {
    registry: DeviceRegistry,
    state: SessionState,
}

impl SessionManager {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            state: SessionState::Closed,
        }
    }

    /// Open a session with accessory `id` using its first protocol
    ///
    /// Fails without touching the current state when the accessory is
    /// missing, has no protocol, a session is already open, or the platform
    /// refuses the session.
    pub fn open_device(&mut self, id: AccessoryId) -> Result<bool> {
        let accessory = self
            .registry
            .find(id)
            .ok_or(AccessoryError::DeviceNotFound(id))?;

        let protocol = accessory
            .protocols
            .first()
            .cloned()
            .ok_or(AccessoryError::NoProtocol(id))?;

        if let SessionState::Open(current) = &self.state {
            return Err(AccessoryError::SessionAlreadyOpen(current.accessory.id));
        }

        let channels = self
            .registry
            .open_channels(&accessory, &protocol)
            .map_err(|e| AccessoryError::SessionCreationFailed {
                id,
                protocol: protocol.clone(),
                reason: e.to_string(),
            })?;

        info!(
            "Session opened: accessory={} protocol={} input={} output={}",
            id,
            protocol,
            channels.input.is_some(),
            channels.output.is_some()
        );

        self.state = SessionState::Open(Session {
            accessory,
            protocol,
            input: channels.input,
            output: channels.output,
        });
        Ok(true)
    }

    /// Close the current session; a no-op when already closed
    pub fn close_device(&mut self) {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Open(session) => {
                let id = session.accessory.id;
                session.close();
                info!("Session closed: accessory={}", id);
            }
            SessionState::Closed => debug!("Close requested with no open session"),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open(_))
    }

    /// The open session, if any
    pub fn current(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Open(session) => Some(session),
            SessionState::Closed => None,
        }
    }

    /// The open session, or `InvalidSession` when closed
    pub(crate) fn active_session_mut(&mut self) -> Result<&mut Session> {
        match &mut self.state {
            SessionState::Open(session) => Ok(session),
            SessionState::Closed => Err(AccessoryError::InvalidSession("No active session")),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close_device();
    }
}
