//! Message serialization and deserialization using postcard
//!
//! Messages are serialized using postcard (compact binary format) and framed
//! with a length prefix when sent over a byte stream.
//!
//! # Frame Format
//!
//! ```text
//! [Length: u32 (big-endian)][Message bytes (postcard serialized)]
//! ```

use crate::{CURRENT_VERSION, Message, ProtocolVersion, error::ProtocolError, error::Result};

#[cfg(feature = "async")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Maximum allowed frame size (32 MiB)
pub const MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Encode a message to bytes using postcard
///
/// # Example
/// ```
/// use protocol::{Message, MethodCall, RequestId, encode_message};
///
/// let msg = Message::call(RequestId(1), MethodCall::new("getDeviceList"));
/// let bytes = encode_message(&msg).unwrap();
/// assert!(!bytes.is_empty());
/// ```
pub fn encode_message(message: &Message) -> Result<Vec<u8>> {
    postcard::to_allocvec(message).map_err(ProtocolError::from)
}

/// Decode a message from bytes using postcard
pub fn decode_message(bytes: &[u8]) -> Result<Message> {
    postcard::from_bytes(bytes).map_err(ProtocolError::from)
}

/// Validate protocol version compatibility
///
/// Compatible if major versions match.
pub fn validate_version(message_version: &ProtocolVersion) -> Result<()> {
    if message_version.major != CURRENT_VERSION.major {
        return Err(ProtocolError::IncompatibleVersion {
            major: message_version.major,
            minor: message_version.minor,
            expected_major: CURRENT_VERSION.major,
            expected_minor: CURRENT_VERSION.minor,
        });
    }
    Ok(())
}

fn check_frame_size(length: usize) -> Result<()> {
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}

/// Encode a message with length prefix for framing
///
/// # Example
/// ```
/// use protocol::{Message, MethodCall, RequestId, encode_framed, decode_framed};
///
/// let msg = Message::call(RequestId(3), MethodCall::new("closeDevice"));
/// let framed = encode_framed(&msg).unwrap();
/// let decoded = decode_framed(&framed).unwrap();
/// assert_eq!(decoded.version, msg.version);
/// ```
pub fn encode_framed(message: &Message) -> Result<Vec<u8>> {
    let message_bytes = encode_message(message)?;
    let message_len = message_bytes.len();
    check_frame_size(message_len)?;

    let mut frame = Vec::with_capacity(4 + message_len);
    frame.extend_from_slice(&(message_len as u32).to_be_bytes());
    frame.extend_from_slice(&message_bytes);

    Ok(frame)
}

/// Decode a framed message
pub fn decode_framed(frame: &[u8]) -> Result<Message> {
    if frame.len() < 4 {
        return Err(ProtocolError::IncompleteFrame {
            expected: 4,
            actual: frame.len(),
        });
    }

    let length = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    check_frame_size(length)?;

    if frame.len() < 4 + length {
        return Err(ProtocolError::IncompleteFrame {
            expected: 4 + length,
            actual: frame.len(),
        });
    }

    decode_message(&frame[4..4 + length])
}

/// Async: Write a framed message to an async writer (e.g., TCP stream)
#[cfg(feature = "async")]
pub async fn write_framed_async<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let framed = encode_framed(message)?;
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

/// Async: Read a framed message from an async reader (e.g., TCP stream)
#[cfg(feature = "async")]
pub async fn read_framed_async<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let length = u32::from_be_bytes(len_bytes) as usize;
    check_frame_size(length)?;

    let mut message_bytes = vec![0u8; length];
    reader.read_exact(&mut message_bytes).await?;

    decode_message(&message_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MessagePayload, ProtocolVersion,
        types::{ErrorCode, MethodCall, MethodResponse, RequestId, Value},
    };

    #[test]
    fn test_call_roundtrip() {
        let msg = Message::call(
            RequestId(42),
            MethodCall::new("bulkTransferOut")
                .arg("data", vec![1u8, 2, 3])
                .arg("timeout", 1000),
        );

        let bytes = encode_message(&msg).unwrap();
        let decoded = decode_message(&bytes).unwrap();

        match decoded.payload {
            MessagePayload::Call { id, call } => {
                assert_eq!(id, RequestId(42));
                assert_eq!(call.method, "bulkTransferOut");
                assert_eq!(
                    call.argument("data").and_then(Value::as_bytes),
                    Some(&[1u8, 2, 3][..])
                );
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_error_reply_roundtrip() {
        let msg = Message::reply(
            RequestId(7),
            MethodResponse::error(ErrorCode::InvalidSession, "No active session"),
        );

        let framed = encode_framed(&msg).unwrap();
        let decoded = decode_framed(&framed).unwrap();

        match decoded.payload {
            MessagePayload::Reply { id, response } => {
                assert_eq!(id, RequestId(7));
                assert_eq!(response.error_code(), Some(ErrorCode::InvalidSession));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_framed_stream_sequence() {
        let mut buffer = Vec::new();
        for i in 0..3 {
            let msg = Message::reply(RequestId(i), MethodResponse::Success(Value::Int(i as i64)));
            write_framed_async(&mut buffer, &msg).await.unwrap();
        }

        let mut stream = &buffer[..];
        for i in 0..3 {
            match read_framed_async(&mut stream).await.unwrap().payload {
                MessagePayload::Reply { id, response } => {
                    assert_eq!(id, RequestId(i));
                    assert_eq!(response.value(), Some(&Value::Int(i as i64)));
                }
                other => panic!("unexpected payload {:?}", other),
            }
        }
    }

    #[test]
    fn test_incomplete_frame() {
        let result = decode_framed(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteFrame {
                expected: 4,
                actual: 2
            })
        ));

        let result = decode_framed(&[0, 0, 0, 10, 1, 2]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteFrame {
                expected: 14,
                actual: 6
            })
        ));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let length = (MAX_FRAME_SIZE as u32) + 1;
        assert!(matches!(
            decode_framed(&length.to_be_bytes()),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_oversized_stream_frame_rejected() {
        let length = (MAX_FRAME_SIZE as u32) + 1;
        let bytes = length.to_be_bytes();
        let mut stream = &bytes[..];
        assert!(matches!(
            read_framed_async(&mut stream).await,
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version(&CURRENT_VERSION).is_ok());

        let future_minor = ProtocolVersion {
            major: CURRENT_VERSION.major,
            minor: CURRENT_VERSION.minor + 1,
            patch: 0,
        };
        assert!(validate_version(&future_minor).is_ok());

        let next_major = ProtocolVersion {
            major: CURRENT_VERSION.major + 1,
            minor: 0,
            patch: 0,
        };
        assert!(matches!(
            validate_version(&next_major),
            Err(ProtocolError::IncompatibleVersion { .. })
        ));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_async_framing() {
        let msg = Message::call(RequestId(9), MethodCall::new("getDeviceList"));

        let mut buffer = Vec::new();
        write_framed_async(&mut buffer, &msg).await.unwrap();

        let mut reader = &buffer[..];
        let decoded = read_framed_async(&mut reader).await.unwrap();
        assert!(matches!(
            decoded.payload,
            MessagePayload::Call { id: RequestId(9), .. }
        ));
    }
}
