//! Accessory host error types

use protocol::{AccessoryId, ErrorCode, MethodResponse};
use thiserror::Error;

/// Failure of a registry, session, configuration or transfer operation
///
/// Every variant maps to exactly one [`ErrorCode`]. None of these leave
/// partial state behind: the operation either completed or had no effect,
/// except `TransferFailed` where the stream state is unknown.
#[derive(Debug, Error)]
pub enum AccessoryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(AccessoryId),

    #[error("No supported protocol found for device {0}")]
    NoProtocol(AccessoryId),

    #[error("A session is already open for device {0}")]
    SessionAlreadyOpen(AccessoryId),

    #[error("Failed to create session for device {id} with protocol {protocol}: {reason}")]
    SessionCreationFailed {
        id: AccessoryId,
        protocol: String,
        reason: String,
    },

    #[error("{0}")]
    InvalidSession(&'static str),

    #[error("Bulk transfer failed: {0}")]
    TransferFailed(String),
}

impl AccessoryError {
    /// Code reported to the caller
    pub fn code(&self) -> ErrorCode {
        match self {
            AccessoryError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            AccessoryError::DeviceNotFound(_) => ErrorCode::DeviceNotFound,
            AccessoryError::NoProtocol(_) => ErrorCode::NoProtocol,
            AccessoryError::SessionAlreadyOpen(_) => ErrorCode::SessionAlreadyOpen,
            AccessoryError::SessionCreationFailed { .. } => ErrorCode::SessionCreationFailed,
            AccessoryError::InvalidSession(_) => ErrorCode::InvalidSession,
            AccessoryError::TransferFailed(_) => ErrorCode::TransferFailed,
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        AccessoryError::InvalidArgument(message.into())
    }
}

impl From<AccessoryError> for MethodResponse {
    fn from(err: AccessoryError) -> Self {
        MethodResponse::error(err.code(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AccessoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            AccessoryError::DeviceNotFound(AccessoryId(99)).code(),
            ErrorCode::DeviceNotFound
        );
        assert_eq!(
            AccessoryError::InvalidSession("No active session").code(),
            ErrorCode::InvalidSession
        );
        assert_eq!(
            AccessoryError::TransferFailed("zero-length read".into()).code(),
            ErrorCode::TransferFailed
        );
    }

    #[test]
    fn test_into_response() {
        let response: MethodResponse = AccessoryError::NoProtocol(AccessoryId(3)).into();
        match response {
            MethodResponse::Error { code, message } => {
                assert_eq!(code, ErrorCode::NoProtocol);
                assert!(message.contains("device 3"));
            }
            other => panic!("unexpected response {:?}", other),
        }
    }
}
