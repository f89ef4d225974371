//! USB accessory platform backed by rusb
//!
//! Every device on the bus that passes the configured VID:PID filters is
//! reported as an accessory. Its protocols are the interfaces of the active
//! configuration that carry a bulk IN and a bulk OUT endpoint, named
//! `bulk-if<N>`. Opening a session claims that interface and binds the two
//! endpoints as the session's channels.

use super::{AccessoryPlatform, InputChannel, OutputChannel, PlatformError, SessionChannels};
use protocol::{Accessory, AccessoryId};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of protocol names advertised for bulk interfaces
const PROTOCOL_PREFIX: &str = "bulk-if";

/// Accessory id for a device at `bus`/`address`
///
/// Stable for as long as the device stays connected.
pub fn accessory_id(bus: u8, address: u8) -> AccessoryId {
    AccessoryId((i64::from(bus) << 8) | i64::from(address))
}

/// Protocol name advertised for an interface
pub fn protocol_name(interface: u8) -> String {
    format!("{}{}", PROTOCOL_PREFIX, interface)
}

/// Interface number encoded in a protocol name
pub fn parse_protocol_name(name: &str) -> Option<u8> {
    name.strip_prefix(PROTOCOL_PREFIX)?.parse().ok()
}

/// Check if a VID/PID pair is allowed by the filters
///
/// Filter format: "0xVID:0xPID", either side may be "*". No filters allows
/// every device.
pub fn matches_filters(vid: u16, pid: u16, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }

    let matches_part = |part: &str, value: u16| {
        part == "*"
            || u16::from_str_radix(part.trim_start_matches("0x").trim_start_matches("0X"), 16)
                .map(|v| v == value)
                .unwrap_or(false)
    };

    filters.iter().any(|filter| match filter.split_once(':') {
        Some((vid_part, pid_part)) => matches_part(vid_part, vid) && matches_part(pid_part, pid),
        None => false,
    })
}

/// Bulk endpoint pair of one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BulkInterface {
    number: u8,
    in_address: u8,
    out_address: u8,
}

/// rusb-backed accessory platform
pub struct UsbPlatform {
    context: Context,
    filters: Vec<String>,
}

impl UsbPlatform {
    /// Create a platform reporting devices allowed by `filters`
    pub fn new(filters: Vec<String>) -> Result<Self, rusb::Error> {
        let context = Context::new()?;
        Ok(Self { context, filters })
    }

    fn is_device_allowed(&self, device: &Device<Context>) -> bool {
        let desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(_) => return false,
        };

        // Root hubs are VID 0x1d6b (Linux Foundation) with device class 9 (Hub)
        if desc.vendor_id() == 0x1d6b && desc.class_code() == 9 {
            return false;
        }

        matches_filters(desc.vendor_id(), desc.product_id(), &self.filters)
    }

    /// Interfaces (alternate setting 0) with one bulk IN and one bulk OUT endpoint
    fn bulk_interfaces(device: &Device<Context>) -> Vec<BulkInterface> {
        let config = match device.active_config_descriptor() {
            Ok(config) => config,
            Err(e) => {
                debug!(
                    "No active configuration on bus={} addr={}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for interface in config.interfaces() {
            let Some(setting) = interface.descriptors().find(|d| d.setting_number() == 0) else {
                continue;
            };

            let mut in_address = None;
            let mut out_address = None;
            for endpoint in setting.endpoint_descriptors() {
                if endpoint.transfer_type() != rusb::TransferType::Bulk {
                    continue;
                }
                match endpoint.direction() {
                    rusb::Direction::In => in_address = in_address.or(Some(endpoint.address())),
                    rusb::Direction::Out => out_address = out_address.or(Some(endpoint.address())),
                }
            }

            if let (Some(in_address), Some(out_address)) = (in_address, out_address) {
                found.push(BulkInterface {
                    number: interface.number(),
                    in_address,
                    out_address,
                });
            }
        }
        found
    }

    fn accessory_for(device: &Device<Context>) -> Option<Accessory> {
        let descriptor = device.device_descriptor().ok()?;

        // Strings need an open handle; accessories we cannot open keep empty fields
        let handle = device.open().ok();
        let read_string = |index: Option<u8>| {
            handle
                .as_ref()
                .zip(index)
                .and_then(|(handle, idx)| handle.read_string_descriptor_ascii(idx).ok())
                .unwrap_or_default()
        };

        let protocols = Self::bulk_interfaces(device)
            .iter()
            .map(|interface| protocol_name(interface.number))
            .collect();

        Some(Accessory {
            id: accessory_id(device.bus_number(), device.address()),
            manufacturer: read_string(descriptor.manufacturer_string_index()),
            product: read_string(descriptor.product_string_index()),
            serial_number: read_string(descriptor.serial_number_string_index()),
            protocols,
        })
    }

    fn find_device(&self, id: AccessoryId) -> Result<Device<Context>, PlatformError> {
        self.context
            .devices()?
            .iter()
            .find(|device| accessory_id(device.bus_number(), device.address()) == id)
            .ok_or(PlatformError::Disconnected)
    }
}

impl AccessoryPlatform for UsbPlatform {
    fn connected_accessories(&self) -> Vec<Accessory> {
        let devices = match self.context.devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate USB devices: {}", e);
                return Vec::new();
            }
        };

        devices
            .iter()
            .filter(|device| self.is_device_allowed(device))
            .filter_map(|device| Self::accessory_for(&device))
            .collect()
    }

    fn open_session(
        &self,
        accessory: &Accessory,
        protocol: &str,
    ) -> Result<SessionChannels, PlatformError> {
        let interface_number = parse_protocol_name(protocol)
            .ok_or_else(|| PlatformError::ProtocolUnavailable(protocol.to_string()))?;

        let device = self.find_device(accessory.id)?;
        let interface = Self::bulk_interfaces(&device)
            .into_iter()
            .find(|interface| interface.number == interface_number)
            .ok_or_else(|| PlatformError::ProtocolUnavailable(protocol.to_string()))?;

        let claim = Arc::new(ClaimedInterface::claim(device.open()?, interface.number)?);
        debug!(
            "Session channels bound: interface={} in={:#04x} out={:#04x}",
            interface.number, interface.in_address, interface.out_address
        );

        Ok(SessionChannels {
            input: Some(Box::new(BulkInChannel {
                claim: Some(claim.clone()),
                endpoint: interface.in_address,
            })),
            output: Some(Box::new(BulkOutChannel {
                claim: Some(claim),
                endpoint: interface.out_address,
            })),
        })
    }
}

/// Open handle with one claimed interface; released when the last channel drops
struct ClaimedInterface {
    handle: DeviceHandle<Context>,
    interface: u8,
    reattach_kernel_driver: bool,
}

impl ClaimedInterface {
    fn claim(mut handle: DeviceHandle<Context>, interface: u8) -> Result<Self, rusb::Error> {
        let mut reattach_kernel_driver = false;
        match handle.kernel_driver_active(interface) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", interface);
                handle.detach_kernel_driver(interface)?;
                reattach_kernel_driver = true;
            }
            Ok(false) => {}
            Err(e) => debug!(
                "Could not check kernel driver status for interface {}: {}",
                interface, e
            ),
        }

        handle.claim_interface(interface)?;
        debug!("Claimed interface {}", interface);

        Ok(Self {
            handle,
            interface,
            reattach_kernel_driver,
        })
    }
}

impl Drop for ClaimedInterface {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            warn!("Failed to release interface {}: {}", self.interface, e);
        }
        if self.reattach_kernel_driver {
            if let Err(e) = self.handle.attach_kernel_driver(self.interface) {
                debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    self.interface, e
                );
            }
        }
        debug!("Released interface {}", self.interface);
    }
}

fn closed_channel() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "channel closed")
}

/// Map rusb errors onto the channel I/O contract
fn map_rusb_error(err: rusb::Error) -> io::Error {
    let kind = match err {
        rusb::Error::Timeout => io::ErrorKind::TimedOut,
        rusb::Error::NoDevice => io::ErrorKind::NotConnected,
        rusb::Error::Access => io::ErrorKind::PermissionDenied,
        rusb::Error::Pipe => io::ErrorKind::BrokenPipe,
        rusb::Error::Interrupted => io::ErrorKind::Interrupted,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

struct BulkInChannel {
    claim: Option<Arc<ClaimedInterface>>,
    endpoint: u8,
}

impl InputChannel for BulkInChannel {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let claim = self.claim.as_ref().ok_or_else(closed_channel)?;
        claim
            .handle
            .read_bulk(self.endpoint, buf, timeout)
            .map_err(map_rusb_error)
    }

    fn close(&mut self) -> io::Result<()> {
        self.claim = None;
        Ok(())
    }
}

struct BulkOutChannel {
    claim: Option<Arc<ClaimedInterface>>,
    endpoint: u8,
}

impl OutputChannel for BulkOutChannel {
    fn write(&mut self, data: &[u8], timeout: Duration) -> io::Result<usize> {
        let claim = self.claim.as_ref().ok_or_else(closed_channel)?;
        claim
            .handle
            .write_bulk(self.endpoint, data, timeout)
            .map_err(map_rusb_error)
    }

    fn close(&mut self) -> io::Result<()> {
        self.claim = None;
        Ok(())
    }
}
