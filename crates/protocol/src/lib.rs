//! Command protocol for the quick-usb accessory host
//!
//! This crate defines the values exchanged between an application and the
//! accessory host: method calls with argument maps, structured responses and
//! failure codes, accessory records and the configuration model. Messages are
//! serialized with postcard and carried in length-prefixed frames.
//!
//! # Example
//!
//! ```
//! use protocol::{Message, MethodCall, RequestId, MessagePayload};
//! use protocol::{encode_framed, decode_framed};
//!
//! let call = MethodCall::new("openDevice").arg("identifier", 7);
//! let msg = Message::call(RequestId(1), call);
//!
//! let framed = encode_framed(&msg).unwrap();
//! let decoded = decode_framed(&framed).unwrap();
//! assert!(matches!(decoded.payload, MessagePayload::Call { .. }));
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;
pub mod version;

pub use codec::{
    MAX_FRAME_SIZE, decode_framed, decode_message, encode_framed, encode_message,
    validate_version,
};

#[cfg(feature = "async")]
pub use codec::{read_framed_async, write_framed_async};
pub use error::{ProtocolError, Result};
pub use messages::{Message, MessagePayload};
pub use types::{
    Accessory, AccessoryId, Arguments, ConfigurationInfo, ConfigurationSource, Direction,
    EndpointInfo, ErrorCode, InterfaceInfo, MethodCall, MethodResponse, RequestId, Value,
    value_map,
};
pub use version::{CURRENT_VERSION, ProtocolVersion};
