//! TCP round trips through the command server and accessory worker

use common::create_accessory_bridge;
use common::test_utils::{DEFAULT_TEST_TIMEOUT, create_mock_accessory, with_timeout};
use host::Dispatcher;
use host::network::CommandServer;
use host::test_utils::{MemoryPlatform, ReadStep};
use host::worker::spawn_accessory_worker;
use protocol::{
    AccessoryId, ErrorCode, Message, MessagePayload, MethodCall, MethodResponse, ProtocolError,
    ProtocolVersion, RequestId, Value, read_framed_async, write_framed_async,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

async fn start_server(platform: &MemoryPlatform) -> SocketAddr {
    let (bridge, worker) = create_accessory_bridge();
    spawn_accessory_worker(worker, Dispatcher::new(Arc::new(platform.clone()), 1024)).unwrap();

    let server = CommandServer::bind("127.0.0.1:0".parse().unwrap(), bridge)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn roundtrip(stream: &mut TcpStream, id: u64, call: MethodCall) -> MethodResponse {
    write_framed_async(stream, &Message::call(RequestId(id), call))
        .await
        .unwrap();
    let reply = with_timeout(DEFAULT_TEST_TIMEOUT, read_framed_async(stream))
        .await
        .unwrap()
        .unwrap();

    match reply.payload {
        MessagePayload::Reply { id: reply_id, response } => {
            assert_eq!(reply_id, RequestId(id));
            response
        }
        other => panic!("expected Reply, got {:?}", other),
    }
}

#[tokio::test]
async fn test_session_over_tcp() {
    let platform = MemoryPlatform::new();
    platform.connect(create_mock_accessory(7, &["com.example.proto"]));
    platform.queue_read(AccessoryId(7), ReadStep::Data(vec![5; 10]));
    let addr = start_server(&platform).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = roundtrip(&mut stream, 1, MethodCall::new("openDevice").arg("identifier", 7)).await;
    assert_eq!(response, MethodResponse::Success(Value::Bool(true)));

    let response = roundtrip(
        &mut stream,
        2,
        MethodCall::new("bulkTransferIn")
            .arg("maxLength", 64)
            .arg("timeout", 1000),
    )
    .await;
    assert_eq!(response, MethodResponse::Success(Value::Bytes(vec![5; 10])));

    let response = roundtrip(&mut stream, 3, MethodCall::new("closeDevice")).await;
    assert_eq!(response, MethodResponse::Success(Value::Null));

    let response = roundtrip(
        &mut stream,
        4,
        MethodCall::new("bulkTransferOut")
            .arg("data", vec![1u8])
            .arg("timeout", 0),
    )
    .await;
    assert_eq!(response.error_code(), Some(ErrorCode::InvalidSession));
}

#[tokio::test]
async fn test_session_shared_across_connections() {
    let platform = MemoryPlatform::new();
    platform.connect(create_mock_accessory(7, &["com.example.proto"]));
    let addr = start_server(&platform).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    let mut second = TcpStream::connect(addr).await.unwrap();

    let response = roundtrip(&mut first, 1, MethodCall::new("openDevice").arg("identifier", 7)).await;
    assert!(response.is_success());

    let response =
        roundtrip(&mut second, 1, MethodCall::new("openDevice").arg("identifier", 7)).await;
    assert_eq!(response.error_code(), Some(ErrorCode::SessionAlreadyOpen));
}

#[tokio::test]
async fn test_unknown_method_over_tcp() {
    let platform = MemoryPlatform::new();
    let addr = start_server(&platform).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = roundtrip(&mut stream, 9, MethodCall::new("controlTransfer")).await;
    assert_eq!(response, MethodResponse::NotImplemented);
}

#[tokio::test]
async fn test_incompatible_version_rejected() {
    let platform = MemoryPlatform::new();
    let addr = start_server(&platform).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let message = Message {
        version: ProtocolVersion {
            major: 99,
            minor: 0,
            patch: 0,
        },
        payload: MessagePayload::Call {
            id: RequestId(1),
            call: MethodCall::new("getDeviceList"),
        },
    };
    write_framed_async(&mut stream, &message).await.unwrap();
    let reply = read_framed_async(&mut stream).await.unwrap();
    assert!(matches!(reply.payload, MessagePayload::Error { .. }));

    // Connection stays usable
    let response = roundtrip(&mut stream, 2, MethodCall::new("getDeviceList")).await;
    assert_eq!(response, MethodResponse::Success(Value::List(vec![])));
}

#[tokio::test]
async fn test_reply_message_rejected() {
    let platform = MemoryPlatform::new();
    let addr = start_server(&platform).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let message = Message::reply(RequestId(1), MethodResponse::NotImplemented);
    write_framed_async(&mut stream, &message).await.unwrap();
    let reply = read_framed_async(&mut stream).await.unwrap();
    match reply.payload {
        MessagePayload::Error { message } => assert_eq!(
            message,
            ProtocolError::UnexpectedMessage("expected a Call message").to_string()
        ),
        other => panic!("expected Error, got {:?}", other),
    }
}
