//! Accessory and command type definitions
//!
//! This module defines the values that cross the command boundary: the
//! loosely typed argument/result [`Value`], method calls and responses,
//! failure codes, accessory records and the configuration model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Accessory identifier (platform-assigned)
///
/// Opaque integer that stays stable only while the accessory remains
/// connected. Two registry snapshots may be compared by id equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessoryId(pub i64);

impl fmt::Display for AccessoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request ID for matching replies to calls on one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Argument map of a method call, keyed by argument name
pub type Arguments = BTreeMap<String, Value>;

/// Dynamically typed value carried in arguments and results
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value (unit result)
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    /// Raw byte buffer
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Integer payload, if this is an `Int`
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Byte payload, if this is `Bytes`
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// String payload, if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// List payload, if this is a `List`
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a key, if this is a `Map`
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

/// Build a `Value::Map` from `(key, value)` pairs
pub fn value_map<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

/// Named command with its argument map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Method name, e.g. `openDevice`
    pub method: String,
    /// Arguments keyed by name
    #[serde(default)]
    pub arguments: Arguments,
}

impl MethodCall {
    /// Create a call without arguments
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Arguments::new(),
        }
    }

    /// Add an argument (builder style)
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Look up an argument by name
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }
}

/// Failure codes reported back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Missing or malformed argument
    InvalidArgument,
    /// No connected accessory with the requested identifier
    DeviceNotFound,
    /// The accessory advertises no protocol to open a session with
    NoProtocol,
    /// No open session, or the session lacks the needed channel
    InvalidSession,
    /// The stream reported a non-positive result
    TransferFailed,
    /// A session is already open
    SessionAlreadyOpen,
    /// The platform refused to create the session
    SessionCreationFailed,
    /// The command could not be processed by the host
    Internal,
}

impl ErrorCode {
    /// Wire name of the code, e.g. `DEVICE_NOT_FOUND`
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::DeviceNotFound => "DEVICE_NOT_FOUND",
            ErrorCode::NoProtocol => "NO_PROTOCOL",
            ErrorCode::InvalidSession => "INVALID_SESSION",
            ErrorCode::TransferFailed => "TRANSFER_FAILED",
            ErrorCode::SessionAlreadyOpen => "SESSION_ALREADY_OPEN",
            ErrorCode::SessionCreationFailed => "SESSION_CREATION_FAILED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MethodResponse {
    /// Command succeeded with a result value
    Success(Value),
    /// Command failed
    Error {
        code: ErrorCode,
        message: String,
    },
    /// Method name is not recognized
    NotImplemented,
}

impl MethodResponse {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        MethodResponse::Error {
            code,
            message: message.into(),
        }
    }

    /// Error code, if this is a failure
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            MethodResponse::Error { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Success value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            MethodResponse::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MethodResponse::Success(_))
    }
}

/// Connected accessory as reported by the registry
///
/// Built fresh from every registry query; vendor and product ids are not
/// disclosed by accessory platforms and are always reported as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessory {
    pub id: AccessoryId,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
    /// Protocol names the accessory supports, in platform order
    pub protocols: Vec<String>,
}

impl Accessory {
    /// Vendor ID placeholder reported in list records
    pub const VENDOR_ID: i64 = 0;
    /// Product ID placeholder reported in list records
    pub const PRODUCT_ID: i64 = 0;
    /// Accessories always expose a single configuration
    pub const CONFIGURATION_COUNT: i64 = 1;

    /// Record returned by `getDeviceList`
    pub fn list_record(&self) -> Value {
        value_map([
            ("identifier", Value::Int(self.id.0)),
            ("vendorId", Value::Int(Self::VENDOR_ID)),
            ("productId", Value::Int(Self::PRODUCT_ID)),
            ("configurationCount", Value::Int(Self::CONFIGURATION_COUNT)),
            ("manufacturer", Value::from(self.manufacturer.as_str())),
            ("product", Value::from(self.product.as_str())),
            ("serialNumber", Value::from(self.serial_number.as_str())),
            (
                "protocols",
                Value::List(self.protocols.iter().map(|p| Value::from(p.as_str())).collect()),
            ),
        ])
    }

    /// Record returned by `getDeviceDescription`
    pub fn description(&self) -> Value {
        value_map([
            ("manufacturer", Value::from(self.manufacturer.as_str())),
            ("product", Value::from(self.product.as_str())),
            ("serialNumber", Value::from(self.serial_number.as_str())),
        ])
    }
}

/// Endpoint direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

impl Direction {
    /// Direction bit as it appears in an endpoint address
    pub fn bits(&self) -> u8 {
        match self {
            Direction::In => 0x80,
            Direction::Out => 0x00,
        }
    }
}

/// Where a configuration view came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationSource {
    /// Fixed shape declared by a platform that negotiates configuration itself
    Synthesized,
    /// Parsed from real USB descriptors
    Descriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub endpoint_number: u8,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub id: u8,
    pub alternate_setting: u8,
    pub endpoints: Vec<EndpointInfo>,
}

/// Configuration -> interfaces -> endpoints view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationInfo {
    pub id: u8,
    pub index: u8,
    pub interfaces: Vec<InterfaceInfo>,
    pub source: ConfigurationSource,
}

impl ConfigurationInfo {
    pub fn is_synthesized(&self) -> bool {
        self.source == ConfigurationSource::Synthesized
    }

    /// Result value returned by `getConfiguration`
    pub fn to_value(&self) -> Value {
        let interfaces = self
            .interfaces
            .iter()
            .map(|interface| {
                let endpoints = interface
                    .endpoints
                    .iter()
                    .map(|endpoint| {
                        value_map([
                            ("endpointNumber", Value::from(endpoint.endpoint_number)),
                            ("direction", Value::from(endpoint.direction.bits())),
                        ])
                    })
                    .collect();
                value_map([
                    ("id", Value::from(interface.id)),
                    ("alternateSetting", Value::from(interface.alternate_setting)),
                    ("endpoints", Value::List(endpoints)),
                ])
            })
            .collect();

        value_map([
            ("id", Value::from(self.id)),
            ("index", Value::from(self.index)),
            ("interfaces", Value::List(interfaces)),
        ])
    }
}
