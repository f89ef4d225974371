//! Command dispatcher
//!
//! Turns a named [`MethodCall`] into an operation on the accessory core and
//! its outcome into a [`MethodResponse`]. Arguments are checked before any
//! registry, session or stream access, so a malformed call never has a side
//! effect. Unknown method names answer `NotImplemented`.

use crate::accessory::{
    ConfigurationModel, DeviceRegistry, MAX_TRANSFER_LENGTH, SessionManager, bulk_transfer_in,
    bulk_transfer_out,
};
use crate::error::{AccessoryError, Result};
use crate::platform::AccessoryPlatform;
use protocol::{AccessoryId, MethodCall, MethodResponse, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Commands understood by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetDeviceList,
    GetDeviceDescription,
    HasPermission,
    RequestPermission,
    OpenDevice,
    CloseDevice,
    GetConfiguration,
    SetConfiguration,
    ClaimInterface,
    ReleaseInterface,
    BulkTransferIn,
    BulkTransferOut,
}

impl Method {
    pub const ALL: [Method; 12] = [
        Method::GetDeviceList,
        Method::GetDeviceDescription,
        Method::HasPermission,
        Method::RequestPermission,
        Method::OpenDevice,
        Method::CloseDevice,
        Method::GetConfiguration,
        Method::SetConfiguration,
        Method::ClaimInterface,
        Method::ReleaseInterface,
        Method::BulkTransferIn,
        Method::BulkTransferOut,
    ];

    /// Method name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Method::GetDeviceList => "getDeviceList",
            Method::GetDeviceDescription => "getDeviceDescription",
            Method::HasPermission => "hasPermission",
            Method::RequestPermission => "requestPermission",
            Method::OpenDevice => "openDevice",
            Method::CloseDevice => "closeDevice",
            Method::GetConfiguration => "getConfiguration",
            Method::SetConfiguration => "setConfiguration",
            Method::ClaimInterface => "claimInterface",
            Method::ReleaseInterface => "releaseInterface",
            Method::BulkTransferIn => "bulkTransferIn",
            Method::BulkTransferOut => "bulkTransferOut",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }
}

/// Routes method calls to the registry, session manager and transfer engine
pub struct Dispatcher {
    sessions: SessionManager,
    configuration: ConfigurationModel,
    max_transfer_length: usize,
}

impl Dispatcher {
    /// `max_transfer_length` bounds the buffer a single `bulkTransferIn` may request
    ///
    /// Values above [`MAX_TRANSFER_LENGTH`] are clamped to it.
    pub fn new(platform: Arc<dyn AccessoryPlatform>, max_transfer_length: usize) -> Self {
        Self {
            sessions: SessionManager::new(DeviceRegistry::new(platform)),
            configuration: ConfigurationModel,
            max_transfer_length: max_transfer_length.min(MAX_TRANSFER_LENGTH),
        }
    }

    /// Execute one call; never panics on bad input
    pub fn handle(&mut self, call: &MethodCall) -> MethodResponse {
        let Some(method) = Method::from_name(&call.method) else {
            debug!("Method not implemented: {}", call.method);
            return MethodResponse::NotImplemented;
        };

        match self.invoke(method, call) {
            Ok(value) => MethodResponse::Success(value),
            Err(e) => {
                debug!("{} failed: {}", method.name(), e);
                e.into()
            }
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Close any open session
    pub fn shutdown(&mut self) {
        self.sessions.close_device();
    }

    fn registry(&self) -> &DeviceRegistry {
        self.sessions.registry()
    }

    fn invoke(&mut self, method: Method, call: &MethodCall) -> Result<Value> {
        match method {
            Method::GetDeviceList => {
                let records = self
                    .registry()
                    .list_devices()
                    .iter()
                    .map(|accessory| accessory.list_record())
                    .collect();
                Ok(Value::List(records))
            }
            Method::GetDeviceDescription => {
                let id = device_identifier(call)?;
                Ok(self.registry().describe_device(id)?.description())
            }
            Method::HasPermission => {
                let id = identifier(call)?;
                Ok(Value::Bool(self.registry().has_permission(id)))
            }
            Method::RequestPermission => {
                let id = identifier(call)?;
                self.registry().request_permission(id);
                Ok(Value::Null)
            }
            Method::OpenDevice => {
                let id = identifier(call)?;
                Ok(Value::Bool(self.sessions.open_device(id)?))
            }
            Method::CloseDevice => {
                self.sessions.close_device();
                Ok(Value::Null)
            }
            Method::GetConfiguration => {
                let config = self.configuration.get_configuration(optional_device(call));
                Ok(config.to_value())
            }
            Method::SetConfiguration => Ok(Value::Bool(self.configuration.set_configuration(
                optional_device(call),
                optional_index(call.argument("config"), "index"),
            ))),
            Method::ClaimInterface => Ok(Value::Bool(self.configuration.claim_interface(
                optional_device(call),
                optional_index(call.argument("interface"), "id"),
            ))),
            Method::ReleaseInterface => Ok(Value::Bool(self.configuration.release_interface(
                optional_device(call),
                optional_index(call.argument("interface"), "id"),
            ))),
            Method::BulkTransferIn => {
                let max_length = self.max_length(call)?;
                let timeout = timeout(call)?;
                log_endpoint(call);
                let data = bulk_transfer_in(&mut self.sessions, max_length, timeout)?;
                Ok(Value::Bytes(data))
            }
            Method::BulkTransferOut => {
                let data = call
                    .argument("data")
                    .and_then(Value::as_bytes)
                    .ok_or_else(|| AccessoryError::invalid_argument("Invalid data buffer"))?;
                let timeout = timeout(call)?;
                log_endpoint(call);
                let written = bulk_transfer_out(&mut self.sessions, data, timeout)?;
                Ok(Value::from(written))
            }
        }
    }

    fn max_length(&self, call: &MethodCall) -> Result<usize> {
        let max_length = call
            .argument("maxLength")
            .and_then(Value::as_int)
            .ok_or_else(|| AccessoryError::invalid_argument("Invalid maxLength"))?;

        usize::try_from(max_length)
            .ok()
            .filter(|len| (1..=self.max_transfer_length).contains(len))
            .ok_or_else(|| {
                AccessoryError::invalid_argument(format!(
                    "maxLength {} outside 1..={}",
                    max_length, self.max_transfer_length
                ))
            })
    }
}

fn identifier(call: &MethodCall) -> Result<AccessoryId> {
    call.argument("identifier")
        .and_then(Value::as_int)
        .map(AccessoryId)
        .ok_or_else(|| AccessoryError::invalid_argument("Invalid identifier"))
}

fn device_identifier(call: &MethodCall) -> Result<AccessoryId> {
    call.argument("device")
        .and_then(|device| device.get("identifier"))
        .and_then(Value::as_int)
        .map(AccessoryId)
        .ok_or_else(|| AccessoryError::invalid_argument("Invalid device identifier"))
}

/// Device argument of the configuration calls; informational only
fn optional_device(call: &MethodCall) -> Option<AccessoryId> {
    call.argument("device")
        .and_then(|device| device.get("identifier"))
        .and_then(Value::as_int)
        .map(AccessoryId)
}

/// Accepts either a bare integer or a record carrying `key`
fn optional_index(value: Option<&Value>, key: &str) -> Option<i64> {
    value.and_then(|v| v.as_int().or_else(|| v.get(key).and_then(Value::as_int)))
}

fn timeout(call: &MethodCall) -> Result<Duration> {
    call.argument("timeout")
        .and_then(Value::as_int)
        .and_then(|ms| u64::try_from(ms).ok())
        .map(Duration::from_millis)
        .ok_or_else(|| AccessoryError::invalid_argument("Invalid timeout"))
}

fn log_endpoint(call: &MethodCall) {
    if let Some(endpoint) = call.argument("endpoint") {
        debug!("{} endpoint argument ignored: {:?}", call.method, endpoint);
    }
}
