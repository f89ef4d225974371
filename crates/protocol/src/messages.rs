//! Protocol message definitions
//!
//! Every frame exchanged with the host carries a [`Message`]. A client sends
//! `Call` messages and receives one `Reply` per call, matched by request id.

use crate::types::{MethodCall, MethodResponse, RequestId};
use crate::version::ProtocolVersion;
use serde::{Deserialize, Serialize};

/// Top-level message envelope
///
/// All protocol messages are wrapped in this envelope which includes
/// the protocol version for compatibility checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Protocol version of this message
    pub version: ProtocolVersion,
    /// Message payload
    pub payload: MessagePayload,
}

/// All message types in the protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagePayload {
    /// Invoke a named command on the host
    Call {
        /// Caller-chosen id echoed in the reply
        id: RequestId,
        call: MethodCall,
    },

    /// Result of a previous `Call`
    Reply {
        id: RequestId,
        response: MethodResponse,
    },

    /// Protocol-level error (malformed frame, version mismatch)
    Error {
        /// Human-readable error message
        message: String,
    },
}

impl Message {
    /// Wrap a payload with the current protocol version
    pub fn new(payload: MessagePayload) -> Self {
        Self {
            version: crate::CURRENT_VERSION,
            payload,
        }
    }

    pub fn call(id: RequestId, call: MethodCall) -> Self {
        Self::new(MessagePayload::Call { id, call })
    }

    pub fn reply(id: RequestId, response: MethodResponse) -> Self {
        Self::new(MessagePayload::Reply { id, response })
    }
}
