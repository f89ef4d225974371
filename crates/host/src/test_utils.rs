//! In-memory accessory platform for tests
//!
//! [`MemoryPlatform`] stands in for a real accessory stack: tests connect and
//! disconnect accessories, script what the input channel yields, cap or fail
//! writes, and inspect a [`StreamLog`] of every channel call.
//!
//! # Example
//!
//! ```
//! use host::test_utils::{MemoryPlatform, ReadStep};
//! use protocol::{Accessory, AccessoryId};
//!
//! let platform = MemoryPlatform::new();
//! platform.connect(Accessory {
//!     id: AccessoryId(7),
//!     manufacturer: "Acme".into(),
//!     product: "Widget".into(),
//!     serial_number: "SN7".into(),
//!     protocols: vec!["com.example.proto".into()],
//! });
//! platform.queue_read(AccessoryId(7), ReadStep::Data(vec![1, 2, 3]));
//! assert_eq!(platform.log().sessions_opened, 0);
//! ```

use crate::platform::{
    AccessoryPlatform, InputChannel, OutputChannel, PlatformError, SessionChannels,
};
use protocol::{Accessory, AccessoryId};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One scripted result of an input channel read
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Bytes available; a read takes as many as fit and leaves the rest
    Data(Vec<u8>),
    /// Read returns `Ok(0)`
    Eof,
    /// Read fails with this error kind
    Error(io::ErrorKind),
}

/// Record of channel activity across all sessions
#[derive(Debug, Clone, Default)]
pub struct StreamLog {
    pub sessions_opened: usize,
    pub reads: usize,
    pub writes: usize,
    /// Bytes accepted by each write
    pub written: Vec<Vec<u8>>,
    pub last_timeout: Option<Duration>,
    pub input_closed: bool,
    pub output_closed: bool,
}

#[derive(Debug)]
struct ChannelScript {
    reads: VecDeque<ReadStep>,
    write_limit: Option<usize>,
    fail_writes: bool,
    fail_close: bool,
    has_input: bool,
    has_output: bool,
}

impl Default for ChannelScript {
    fn default() -> Self {
        Self {
            reads: VecDeque::new(),
            write_limit: None,
            fail_writes: false,
            fail_close: false,
            has_input: true,
            has_output: true,
        }
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    accessories: Vec<Accessory>,
    scripts: HashMap<AccessoryId, ChannelScript>,
    refuse_sessions: bool,
    log: StreamLog,
}

/// Scriptable in-memory accessory platform
#[derive(Clone, Default)]
pub struct MemoryPlatform {
    state: Arc<Mutex<PlatformState>>,
}

fn lock(state: &Mutex<PlatformState>) -> MutexGuard<'_, PlatformState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an accessory reachable (replaces one with the same id)
    pub fn connect(&self, accessory: Accessory) {
        let mut state = lock(&self.state);
        state.accessories.retain(|a| a.id != accessory.id);
        state.accessories.push(accessory);
    }

    pub fn disconnect(&self, id: AccessoryId) {
        lock(&self.state).accessories.retain(|a| a.id != id);
    }

    /// Make every `open_session` fail
    pub fn refuse_sessions(&self, refuse: bool) {
        lock(&self.state).refuse_sessions = refuse;
    }

    pub fn queue_read(&self, id: AccessoryId, step: ReadStep) {
        self.script(id, |script| script.reads.push_back(step));
    }

    /// Accept at most `limit` bytes per write
    pub fn limit_writes(&self, id: AccessoryId, limit: usize) {
        self.script(id, |script| script.write_limit = Some(limit));
    }

    pub fn fail_writes(&self, id: AccessoryId) {
        self.script(id, |script| script.fail_writes = true);
    }

    /// Make channel close report an error
    pub fn fail_close(&self, id: AccessoryId) {
        self.script(id, |script| script.fail_close = true);
    }

    /// Open sessions for `id` without an input channel
    pub fn without_input(&self, id: AccessoryId) {
        self.script(id, |script| script.has_input = false);
    }

    /// Open sessions for `id` without an output channel
    pub fn without_output(&self, id: AccessoryId) {
        self.script(id, |script| script.has_output = false);
    }

    pub fn log(&self) -> StreamLog {
        lock(&self.state).log.clone()
    }

    fn script(&self, id: AccessoryId, f: impl FnOnce(&mut ChannelScript)) {
        f(lock(&self.state).scripts.entry(id).or_default());
    }
}

impl AccessoryPlatform for MemoryPlatform {
    fn connected_accessories(&self) -> Vec<Accessory> {
        lock(&self.state).accessories.clone()
    }

    fn open_session(
        &self,
        accessory: &Accessory,
        protocol: &str,
    ) -> Result<SessionChannels, PlatformError> {
        let mut state = lock(&self.state);
        if state.refuse_sessions {
            return Err(PlatformError::Refused("sessions disabled".to_string()));
        }
        if !state.accessories.iter().any(|a| a.id == accessory.id) {
            return Err(PlatformError::Disconnected);
        }
        if !accessory.protocols.iter().any(|p| p == protocol) {
            return Err(PlatformError::ProtocolUnavailable(protocol.to_string()));
        }

        state.log.sessions_opened += 1;
        state.log.input_closed = false;
        state.log.output_closed = false;
        let script = state.scripts.entry(accessory.id).or_default();

        let input: Option<Box<dyn InputChannel>> = script.has_input.then(|| {
            Box::new(MemoryInput {
                state: self.state.clone(),
                id: accessory.id,
                closed: false,
            }) as Box<dyn InputChannel>
        });
        let output: Option<Box<dyn OutputChannel>> = script.has_output.then(|| {
            Box::new(MemoryOutput {
                state: self.state.clone(),
                id: accessory.id,
                closed: false,
            }) as Box<dyn OutputChannel>
        });

        Ok(SessionChannels { input, output })
    }
}

fn closed_channel() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "channel closed")
}

struct MemoryInput {
    state: Arc<Mutex<PlatformState>>,
    id: AccessoryId,
    closed: bool,
}

impl InputChannel for MemoryInput {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if self.closed {
            return Err(closed_channel());
        }

        let mut state = lock(&self.state);
        state.log.reads += 1;
        state.log.last_timeout = Some(timeout);

        let script = state.scripts.entry(self.id).or_default();
        match script.reads.pop_front() {
            Some(ReadStep::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    script.reads.push_front(ReadStep::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(ReadStep::Error(kind)) => Err(io::Error::new(kind, "scripted read failure")),
            Some(ReadStep::Eof) | None => Ok(0),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        let mut state = lock(&self.state);
        state.log.input_closed = true;
        if state.scripts.get(&self.id).is_some_and(|s| s.fail_close) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream already broken"));
        }
        Ok(())
    }
}

struct MemoryOutput {
    state: Arc<Mutex<PlatformState>>,
    id: AccessoryId,
    closed: bool,
}

impl OutputChannel for MemoryOutput {
    fn write(&mut self, data: &[u8], timeout: Duration) -> io::Result<usize> {
        if self.closed {
            return Err(closed_channel());
        }

        let mut state = lock(&self.state);
        state.log.writes += 1;
        state.log.last_timeout = Some(timeout);

        let script = state.scripts.entry(self.id).or_default();
        if script.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted write failure"));
        }
        let n = script.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        state.log.written.push(data[..n].to_vec());
        Ok(n)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        let mut state = lock(&self.state);
        state.log.output_closed = true;
        if state.scripts.get(&self.id).is_some_and(|s| s.fail_close) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream already broken"));
        }
        Ok(())
    }
}
