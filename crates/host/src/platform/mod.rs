//! Platform accessory layer
//!
//! The host core never talks to an accessory stack directly. A platform
//! reports the accessories it can currently reach and, given an accessory and
//! one of its protocol names, opens the byte channels of a session. The
//! channel contract mirrors a raw stream call: a read or write returns how
//! many bytes moved, `Ok(0)` when nothing did, or an I/O error.

pub mod usb;

use protocol::Accessory;
use std::io;
use std::time::Duration;
use thiserror::Error;

pub use usb::UsbPlatform;

/// Readable half of a session
pub trait InputChannel: Send {
    /// Single read of at most `buf.len()` bytes
    ///
    /// `timeout` is a hint; implementations without deadline support ignore it.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Close the channel; later reads fail
    fn close(&mut self) -> io::Result<()>;
}

/// Writable half of a session
pub trait OutputChannel: Send {
    /// Single write of `data`; may accept fewer bytes than offered
    fn write(&mut self, data: &[u8], timeout: Duration) -> io::Result<usize>;

    /// Close the channel; later writes fail
    fn close(&mut self) -> io::Result<()>;
}

/// Channels bound for one accessory/protocol pair
///
/// Either half may be missing if the platform could not provide it.
#[derive(Default)]
pub struct SessionChannels {
    pub input: Option<Box<dyn InputChannel>>,
    pub output: Option<Box<dyn OutputChannel>>,
}

/// Reasons a platform refuses to open a session
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Accessory is no longer connected")]
    Disconnected,

    #[error("Protocol '{0}' is not available on this accessory")]
    ProtocolUnavailable(String),

    #[error("Session refused: {0}")]
    Refused(String),
}

/// Source of connected accessories and their sessions
pub trait AccessoryPlatform: Send + Sync {
    /// Snapshot of currently connected accessories
    ///
    /// Records are built fresh on every call.
    fn connected_accessories(&self) -> Vec<Accessory>;

    /// Open the channels of a session for `protocol`
    fn open_session(
        &self,
        accessory: &Accessory,
        protocol: &str,
    ) -> Result<SessionChannels, PlatformError>;
}
