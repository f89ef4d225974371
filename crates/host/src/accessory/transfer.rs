//! Bulk transfer engine
//!
//! One blocking stream call per transfer, no retries. A read returns the
//! prefix of the buffer that was filled; a write reports how many bytes the
//! channel accepted, which may be fewer than offered. A zero count and a
//! stream error are both `TransferFailed`: closed stream, timeout and empty
//! read look the same from here.

use super::session::SessionManager;
use crate::error::{AccessoryError, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Largest read buffer a single `bulk_transfer_in` may allocate
///
/// Half a protocol frame, so the reply carrying the data always fits.
pub const MAX_TRANSFER_LENGTH: usize = protocol::MAX_FRAME_SIZE / 2;

/// Read up to `max_length` bytes from the open session's input channel
///
/// `timeout` is passed to the channel and not enforced here.
pub fn bulk_transfer_in(
    sessions: &mut SessionManager,
    max_length: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let input = sessions
        .active_session_mut()?
        .input_mut()
        .ok_or(AccessoryError::InvalidSession("No active session or input stream"))?;

    let mut buffer = vec![0u8; max_length];
    match input.read(&mut buffer, timeout) {
        Ok(0) => {
            warn!("Bulk IN returned no data (max_length={})", max_length);
            Err(AccessoryError::TransferFailed("no data read".to_string()))
        }
        Ok(n) if n <= max_length => {
            buffer.truncate(n);
            debug!("Bulk IN: {} of {} bytes", n, max_length);
            Ok(buffer)
        }
        Ok(n) => Err(AccessoryError::TransferFailed(format!(
            "channel reported {} bytes for a {} byte buffer",
            n, max_length
        ))),
        Err(e) => {
            warn!("Bulk IN failed: {}", e);
            Err(AccessoryError::TransferFailed(e.to_string()))
        }
    }
}

/// Write `data` once to the open session's output channel
///
/// Returns the accepted byte count; a short write is not an error.
pub fn bulk_transfer_out(
    sessions: &mut SessionManager,
    data: &[u8],
    timeout: Duration,
) -> Result<usize> {
    let output = sessions
        .active_session_mut()?
        .output_mut()
        .ok_or(AccessoryError::InvalidSession("No active session or output stream"))?;

    match output.write(data, timeout) {
        Ok(0) => {
            warn!("Bulk OUT accepted no data (len={})", data.len());
            Err(AccessoryError::TransferFailed("no data written".to_string()))
        }
        Ok(n) if n <= data.len() => {
            if n < data.len() {
                debug!("Bulk OUT short write: {} of {} bytes", n, data.len());
            } else {
                debug!("Bulk OUT: {} bytes", n);
            }
            Ok(n)
        }
        Ok(n) => Err(AccessoryError::TransferFailed(format!(
            "channel reported {} bytes written of {}",
            n,
            data.len()
        ))),
        Err(e) => {
            warn!("Bulk OUT failed: {}", e);
            Err(AccessoryError::TransferFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::DeviceRegistry;
    use crate::test_utils::{MemoryPlatform, ReadStep};
    use common::test_utils::{create_mock_accessory, create_mock_bulk_data};
    use protocol::AccessoryId;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    fn open_session(platform: &MemoryPlatform) -> SessionManager {
        platform.connect(create_mock_accessory(7, &["com.example.proto"]));
        let mut sessions = SessionManager::new(DeviceRegistry::new(Arc::new(platform.clone())));
        sessions.open_device(AccessoryId(7)).unwrap();
        sessions
    }

    #[test]
    fn test_read_returns_prefix() {
        let platform = MemoryPlatform::new();
        let payload = create_mock_bulk_data(10);
        platform.queue_read(AccessoryId(7), ReadStep::Data(payload.clone()));
        let mut sessions = open_session(&platform);

        let data = bulk_transfer_in(&mut sessions, 64, TIMEOUT).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn test_read_bounded_by_max_length() {
        let platform = MemoryPlatform::new();
        let payload = create_mock_bulk_data(100);
        platform.queue_read(AccessoryId(7), ReadStep::Data(payload.clone()));
        let mut sessions = open_session(&platform);

        let first = bulk_transfer_in(&mut sessions, 64, TIMEOUT).unwrap();
        assert_eq!(first, payload[..64]);

        // Remainder stays in the stream for the next read
        let second = bulk_transfer_in(&mut sessions, 64, TIMEOUT).unwrap();
        assert_eq!(second, payload[64..]);
    }

    #[test]
    fn test_zero_read_fails() {
        let platform = MemoryPlatform::new();
        platform.queue_read(AccessoryId(7), ReadStep::Eof);
        let mut sessions = open_session(&platform);

        let err = bulk_transfer_in(&mut sessions, 16, TIMEOUT).unwrap_err();
        assert!(matches!(err, AccessoryError::TransferFailed(_)));
        // Failure leaves the session open
        assert!(sessions.is_open());
    }

    #[test]
    fn test_read_error_fails() {
        let platform = MemoryPlatform::new();
        platform.queue_read(AccessoryId(7), ReadStep::Error(std::io::ErrorKind::TimedOut));
        let mut sessions = open_session(&platform);

        let err = bulk_transfer_in(&mut sessions, 16, TIMEOUT).unwrap_err();
        assert!(matches!(err, AccessoryError::TransferFailed(_)));
        assert_eq!(platform.log().reads, 1);
    }

    #[test]
    fn test_timeout_forwarded_to_channel() {
        let platform = MemoryPlatform::new();
        platform.queue_read(AccessoryId(7), ReadStep::Data(vec![1]));
        let mut sessions = open_session(&platform);

        bulk_transfer_in(&mut sessions, 4, Duration::from_millis(250)).unwrap();
        assert_eq!(platform.log().last_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_short_write_is_success() {
        let platform = MemoryPlatform::new();
        platform.limit_writes(AccessoryId(7), 3);
        let mut sessions = open_session(&platform);

        let written = bulk_transfer_out(&mut sessions, &[1, 2, 3, 4, 5], TIMEOUT).unwrap();
        assert_eq!(written, 3);
        assert_eq!(platform.log().written, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_write_error_fails() {
        let platform = MemoryPlatform::new();
        platform.fail_writes(AccessoryId(7));
        let mut sessions = open_session(&platform);

        let err = bulk_transfer_out(&mut sessions, &[1, 2], TIMEOUT).unwrap_err();
        assert!(matches!(err, AccessoryError::TransferFailed(_)));
    }

    #[test]
    fn test_transfers_require_open_session() {
        let platform = MemoryPlatform::new();
        let mut sessions = SessionManager::new(DeviceRegistry::new(Arc::new(platform.clone())));

        let err = bulk_transfer_in(&mut sessions, 8, TIMEOUT).unwrap_err();
        assert!(matches!(err, AccessoryError::InvalidSession(_)));
        let err = bulk_transfer_out(&mut sessions, &[1], TIMEOUT).unwrap_err();
        assert!(matches!(err, AccessoryError::InvalidSession(_)));

        let log = platform.log();
        assert_eq!((log.reads, log.writes), (0, 0));
    }

    #[test]
    fn test_missing_input_channel() {
        let platform = MemoryPlatform::new();
        platform.without_input(AccessoryId(7));
        platform.queue_read(AccessoryId(7), ReadStep::Data(vec![1, 2, 3]));
        let mut sessions = open_session(&platform);

        let err = bulk_transfer_in(&mut sessions, 8, TIMEOUT).unwrap_err();
        assert!(matches!(err, AccessoryError::InvalidSession(_)));
        assert_eq!(platform.log().reads, 0);

        // Output half still works
        assert_eq!(bulk_transfer_out(&mut sessions, &[1], TIMEOUT).unwrap(), 1);
    }

    #[test]
    fn test_missing_output_channel() {
        let platform = MemoryPlatform::new();
        platform.without_output(AccessoryId(7));
        let mut sessions = open_session(&platform);

        let err = bulk_transfer_out(&mut sessions, &[1], TIMEOUT).unwrap_err();
        assert!(matches!(err, AccessoryError::InvalidSession(_)));
    }
}
