//! Integration tests for the TCP transport.
//!
//! These tests spin up a real listener on an ephemeral loopback port and
//! verify that frames survive the network: fragmentation, timeouts,
//! orderly close and abrupt close.

use std::time::Duration;

use kocha_protocol::ChatMessage;
use kocha_transport::{Connection, ConnectionConfig, TcpConnection, TcpTransport, TransportError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

fn short_timeouts() -> ConnectionConfig {
    ConnectionConfig {
        read_timeout: Duration::from_millis(100),
        write_timeout: Duration::from_secs(1),
        ..ConnectionConfig::default()
    }
}

/// Binds a transport on an ephemeral port and returns it with its address.
async fn bind() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0", short_timeouts())
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

/// Returns a connected (server side, client side) pair.
async fn connected_pair() -> (TcpConnection, TcpConnection) {
    let (transport, addr) = bind().await;
    let accept = tokio::spawn(async move { transport.accept().await.expect("should accept") });
    let client = TcpConnection::connect(addr, short_timeouts())
        .await
        .expect("should connect");
    let server = accept.await.expect("accept task");
    (server, client)
}

/// Raw frame bytes for a message, as a peer would write them.
fn raw_frame(message: &ChatMessage) -> Vec<u8> {
    let body = serde_json::to_vec(message).unwrap();
    let mut frame = (body.len() as u32).to_be_bytes().to_vec();
    frame.extend(body);
    frame
}

#[tokio::test]
async fn test_send_and_recv_both_directions() {
    let (server, client) = connected_pair().await;

    let hello = ChatMessage::new("hello from client").with_sender("alice");
    client.send(&hello).await.expect("client send");
    assert_eq!(server.recv().await.expect("server recv"), hello);

    let reply = ChatMessage::from_server("hello from server");
    server.send(&reply).await.expect("server send");
    assert_eq!(client.recv().await.expect("client recv"), reply);
}

#[tokio::test]
async fn test_ids_are_distinct_and_peer_addr_is_loopback() {
    let (server, client) = connected_pair().await;
    assert_ne!(server.id(), client.id());
    assert!(server.peer_addr().ip().is_loopback());
}

#[tokio::test]
async fn test_bind_in_use_address_fails_with_bind_error() {
    let (_transport, addr) = bind().await;
    let result = TcpTransport::bind(&addr, ConnectionConfig::default()).await;
    assert!(matches!(result, Err(TransportError::Bind { .. })));
}

#[tokio::test]
async fn test_recv_times_out_when_peer_is_silent() {
    let (server, _client) = connected_pair().await;

    let err = server.recv().await.expect_err("nothing was sent");
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert!(!err.is_closed());
}

#[tokio::test]
async fn test_partial_frame_survives_timeout() {
    let (transport, addr) = bind().await;
    let accept = tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut raw = TcpStream::connect(addr).await.unwrap();
    let server = accept.await.unwrap();

    let message = ChatMessage::new("slow typist").with_sender("bob");
    let frame = raw_frame(&message);
    let (head, tail) = frame.split_at(frame.len() / 2);

    raw.write_all(head).await.unwrap();
    let err = server.recv().await.expect_err("frame incomplete");
    assert!(err.is_timeout());

    raw.write_all(tail).await.unwrap();
    assert_eq!(server.recv().await.expect("frame completed"), message);
}

#[tokio::test]
async fn test_coalesced_frames_are_delivered_separately() {
    let (transport, addr) = bind().await;
    let accept = tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut raw = TcpStream::connect(addr).await.unwrap();
    let server = accept.await.unwrap();

    let first = ChatMessage::new("first");
    let second = ChatMessage::new("second");
    let mut bytes = raw_frame(&first);
    bytes.extend(raw_frame(&second));
    raw.write_all(&bytes).await.unwrap();

    assert_eq!(server.recv().await.unwrap(), first);
    assert_eq!(server.recv().await.unwrap(), second);
}

#[tokio::test]
async fn test_peer_closing_mid_frame_is_connection_closed() {
    let (transport, addr) = bind().await;
    let accept = tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut raw = TcpStream::connect(addr).await.unwrap();
    let server = accept.await.unwrap();

    let frame = raw_frame(&ChatMessage::new("cut off"));
    raw.write_all(&frame[..6]).await.unwrap();
    drop(raw);

    match server.recv().await {
        Err(TransportError::ConnectionClosed(reason)) => {
            assert!(reason.contains("mid-frame"), "reason: {reason}");
        }
        other => panic!("expected ConnectionClosed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oversized_length_prefix_is_malformed() {
    let (transport, addr) = bind().await;
    let accept = tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut raw = TcpStream::connect(addr).await.unwrap();
    let server = accept.await.unwrap();

    raw.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

    match server.recv().await {
        Err(TransportError::Protocol(e)) => assert!(e.is_malformed()),
        other => panic!("expected MalformedFrame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_close_is_seen_by_server() {
    let (server, client) = connected_pair().await;

    client.close().await;

    let err = server.recv().await.expect_err("peer closed");
    assert!(err.is_closed(), "got {err:?}");
}

#[tokio::test]
async fn test_close_twice_is_a_no_op() {
    let (server, _client) = connected_pair().await;

    server.close().await;
    assert!(server.is_closed());
    server.close().await;
    assert!(server.is_closed());

    let err = server
        .send(&ChatMessage::new("after close"))
        .await
        .expect_err("closed connection cannot send");
    assert!(err.is_closed());
}

#[tokio::test]
async fn test_close_wakes_pending_recv() {
    let (server, _client) = connected_pair().await;
    let server = std::sync::Arc::new(server);

    let reader = {
        let server = std::sync::Arc::clone(&server);
        tokio::spawn(async move { server.recv().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.close().await;

    let result = reader.await.expect("recv task");
    assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
}

#[tokio::test]
async fn test_write_timeout_closes_connection() {
    let (server, _client) = connected_pair().await;
    // Close to the frame limit, so the socket buffers fill quickly.
    let bulky = ChatMessage::new("x".repeat(60_000));

    let mut timed_out = false;
    for _ in 0..2_000 {
        match server.send(&bulky).await {
            Ok(()) => continue,
            Err(e) => {
                assert!(e.is_timeout(), "expected write timeout, got {e:?}");
                timed_out = true;
                break;
            }
        }
    }
    assert!(timed_out, "client never read, yet every write completed");

    assert!(server.is_closed());
    assert!(matches!(server.recv().await, Err(TransportError::ConnectionClosed(_))));
    let err = server.send(&ChatMessage::new("late")).await.expect_err("writer is gone");
    assert!(err.is_closed());
}
