//! Test utilities for the quick-usb accessory host
//!
//! Provides record builders and async helpers shared by tests across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::create_mock_accessory;
//!
//! let accessory = create_mock_accessory(7, &["com.example.proto"]);
//! assert_eq!(accessory.id.0, 7);
//! ```

use protocol::{Accessory, AccessoryId};
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a mock Accessory with the given protocol names
pub fn create_mock_accessory(id: i64, protocols: &[&str]) -> Accessory {
    Accessory {
        id: AccessoryId(id),
        manufacturer: format!("Test Manufacturer {}", id),
        product: format!("Test Product {}", id),
        serial_number: format!("SN{:06}", id),
        protocols: protocols.iter().map(|p| p.to_string()).collect(),
    }
}

/// Create `count` accessories with ids `1..=count`, each supporting one protocol
///
/// # Example
/// ```
/// use common::test_utils::create_mock_accessory_list;
///
/// let accessories = create_mock_accessory_list(3);
/// assert_eq!(accessories.len(), 3);
/// assert_eq!(accessories[2].protocols, vec!["com.example.proto3".to_string()]);
/// ```
pub fn create_mock_accessory_list(count: i64) -> Vec<Accessory> {
    (1..=count)
        .map(|i| create_mock_accessory(i, &[&format!("com.example.proto{}", i)]))
        .collect()
}

/// Deterministic byte pattern for transfer tests
pub fn create_mock_bulk_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_accessory() {
        let accessory = create_mock_accessory(4, &["a", "b"]);
        assert_eq!(accessory.id, AccessoryId(4));
        assert_eq!(accessory.serial_number, "SN000004");
        assert_eq!(accessory.protocols, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_create_mock_bulk_data() {
        let data = create_mock_bulk_data(300);
        assert_eq!(data.len(), 300);
        assert_eq!(data[255], 255);
        assert_eq!(data[256], 0);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_failure() {
        let result = with_timeout(
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(1)),
        )
        .await;
        assert!(result.is_err());
    }
}
