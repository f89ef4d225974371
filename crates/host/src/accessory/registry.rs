//! Device registry
//!
//! Thin view over the platform's connected-accessory set. Nothing is cached:
//! every lookup takes a fresh snapshot and scans it linearly, so results can
//! change between calls as accessories come and go.

use crate::error::{AccessoryError, Result};
use crate::platform::{AccessoryPlatform, PlatformError, SessionChannels};
use protocol::{Accessory, AccessoryId};
use std::sync::Arc;
use tracing::debug;

/// Registry of reachable accessories
#[derive(Clone)]
pub struct DeviceRegistry {
    platform: Arc<dyn AccessoryPlatform>,
}

impl DeviceRegistry {
    pub fn new(platform: Arc<dyn AccessoryPlatform>) -> Self {
        Self { platform }
    }

    /// Currently connected accessories; empty when nothing is connected
    pub fn list_devices(&self) -> Vec<Accessory> {
        let accessories = self.platform.connected_accessories();
        debug!("Registry snapshot: {} accessories", accessories.len());
        accessories
    }

    /// Look up an accessory in a fresh snapshot
    pub fn find(&self, id: AccessoryId) -> Option<Accessory> {
        self.platform
            .connected_accessories()
            .into_iter()
            .find(|accessory| accessory.id == id)
    }

    /// Accessory record for `id`
    pub fn describe_device(&self, id: AccessoryId) -> Result<Accessory> {
        self.find(id).ok_or(AccessoryError::DeviceNotFound(id))
    }

    /// Permission and presence are the same thing for paired accessories
    pub fn has_permission(&self, id: AccessoryId) -> bool {
        self.find(id).is_some()
    }

    /// Authorization happens out of band (pairing), so this only acknowledges
    pub fn request_permission(&self, id: AccessoryId) {
        debug!("Permission request for accessory {} acknowledged", id);
    }

    pub(crate) fn open_channels(
        &self,
        accessory: &Accessory,
        protocol: &str,
    ) -> std::result::Result<SessionChannels, PlatformError> {
        self.platform.open_session(accessory, protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryPlatform;
    use common::test_utils::create_mock_accessory;

    fn registry_with(ids: &[i64]) -> (MemoryPlatform, DeviceRegistry) {
        let platform = MemoryPlatform::new();
        for id in ids {
            platform.connect(create_mock_accessory(*id, &["com.example.proto"]));
        }
        let registry = DeviceRegistry::new(Arc::new(platform.clone()));
        (platform, registry)
    }

    #[test]
    fn test_empty_registry() {
        let (_, registry) = registry_with(&[]);
        assert!(registry.list_devices().is_empty());
        assert!(!registry.has_permission(AccessoryId(1)));
    }

    #[test]
    fn test_describe_device() {
        let (_, registry) = registry_with(&[7]);
        let accessory = registry.describe_device(AccessoryId(7)).unwrap();
        assert_eq!(accessory.product, "Test Product 7");

        let err = registry.describe_device(AccessoryId(99)).unwrap_err();
        assert!(matches!(err, AccessoryError::DeviceNotFound(AccessoryId(99))));
    }

    #[test]
    fn test_lookup_follows_connection_changes() {
        let (platform, registry) = registry_with(&[1, 2]);
        assert!(registry.has_permission(AccessoryId(2)));

        platform.disconnect(AccessoryId(2));
        assert!(!registry.has_permission(AccessoryId(2)));
        assert!(registry.describe_device(AccessoryId(2)).is_err());

        platform.connect(create_mock_accessory(3, &[]));
        assert!(registry.has_permission(AccessoryId(3)));
    }

    #[test]
    fn test_snapshot_ids_stable_without_changes() {
        let (_, registry) = registry_with(&[4, 5, 6]);
        let first: Vec<_> = registry.list_devices().iter().map(|a| a.id).collect();
        let second: Vec<_> = registry.list_devices().iter().map(|a| a.id).collect();
        assert_eq!(first, second);
    }
}
