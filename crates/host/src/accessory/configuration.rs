//! Configuration model
//!
//! Accessory platforms negotiate USB configuration and interfaces on their
//! own. Callers written against a full USB stack still ask for them, so the
//! host declares one fixed configuration and accepts every set/claim/release.

use protocol::{
    AccessoryId, ConfigurationInfo, ConfigurationSource, Direction, EndpointInfo, InterfaceInfo,
};
use tracing::debug;

/// Endpoint number shared by the IN and OUT endpoints of the declared interface
pub const ENDPOINT_NUMBER: u8 = 1;

/// Static configuration view and no-op control operations
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigurationModel;

impl ConfigurationModel {
    /// The single declared configuration; same shape for every device
    pub fn get_configuration(&self, device: Option<AccessoryId>) -> ConfigurationInfo {
        debug!("Configuration requested for {:?}", device);
        ConfigurationInfo {
            id: 1,
            index: 0,
            interfaces: vec![InterfaceInfo {
                id: 0,
                alternate_setting: 0,
                endpoints: vec![
                    EndpointInfo {
                        endpoint_number: ENDPOINT_NUMBER,
                        direction: Direction::In,
                    },
                    EndpointInfo {
                        endpoint_number: ENDPOINT_NUMBER,
                        direction: Direction::Out,
                    },
                ],
            }],
            source: ConfigurationSource::Synthesized,
        }
    }

    pub fn set_configuration(&self, device: Option<AccessoryId>, index: Option<i64>) -> bool {
        debug!("Set configuration {:?} on {:?} accepted", index, device);
        true
    }

    pub fn claim_interface(&self, device: Option<AccessoryId>, interface: Option<i64>) -> bool {
        debug!("Claim interface {:?} on {:?} accepted", interface, device);
        true
    }

    pub fn release_interface(&self, device: Option<AccessoryId>, interface: Option<i64>) -> bool {
        debug!("Release interface {:?} on {:?} accepted", interface, device);
        true
    }
}
