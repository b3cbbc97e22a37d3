//! Integration tests for the TCP transport.
//!
//! These bind a real listener on an ephemeral port and drive it with a
//! plain `TcpStream` client, so bytes cross an actual socket.

use std::time::Duration;

use mineral_transport::cipher::{decrypt_in_place, decryptor, encrypt_in_place, encryptor};
use mineral_transport::{TcpTransport, Transport, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpTransport, std::net::SocketAddr) {
    let transport = TcpTransport::bind("127.0.0.1:0", TIMEOUT)
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have address");
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_accept_and_exchange_bytes() {
    let (mut transport, addr) = bind().await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
    let mut client = TcpStream::connect(addr).await.expect("should connect");
    let mut conn = server.await.expect("task should complete");

    assert_eq!(conn.id.to_string(), "conn-1");
    assert!(conn.peer.is_some());

    client.write_all(&[0xFE, 0x01]).await.unwrap();
    let mut buf = [0u8; 2];
    conn.reader.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, [0xFE, 0x01]);

    conn.writer.send(&[0xFF, 0x00, 0x00]).await.unwrap();
    let mut reply = [0u8; 3];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0xFF, 0x00, 0x00]);
}

#[tokio::test]
async fn test_tcp_connection_ids_are_distinct() {
    let (mut transport, addr) = bind().await;
    let server = tokio::spawn(async move {
        let a = transport.accept().await.expect("first");
        let b = transport.accept().await.expect("second");
        (a.id, b.id)
    });
    let _c1 = TcpStream::connect(addr).await.unwrap();
    let _c2 = TcpStream::connect(addr).await.unwrap();
    let (a, b) = server.await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_tcp_encryption_both_directions() {
    let secret = *b"sixteen byte key";
    let (mut transport, addr) = bind().await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut conn = server.await.unwrap();

    conn.enable_encryption(&secret).await.unwrap();

    let mut outbound = b"ping".to_vec();
    encrypt_in_place(&mut encryptor(&secret).unwrap(), &mut outbound);
    client.write_all(&outbound).await.unwrap();
    let mut got = [0u8; 4];
    conn.reader.read_exact(&mut got).await.unwrap();
    assert_eq!(&got, b"ping");

    conn.writer.send(b"pong").await.unwrap();
    let mut back = [0u8; 4];
    client.read_exact(&mut back).await.unwrap();
    decrypt_in_place(&mut decryptor(&secret).unwrap(), &mut back);
    assert_eq!(&back, b"pong");
}

#[tokio::test]
async fn test_tcp_enable_encryption_rejects_bad_secret() {
    let (mut transport, addr) = bind().await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
    let _client = TcpStream::connect(addr).await.unwrap();
    let mut conn = server.await.unwrap();

    let err = conn.enable_encryption(&[0u8; 8]).await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidKey(8)));
    assert!(!conn.reader.is_encrypted());
}

#[tokio::test]
async fn test_tcp_reader_sees_eof_when_client_disconnects() {
    let (mut transport, addr) = bind().await;
    let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });
    let client = TcpStream::connect(addr).await.unwrap();
    let mut conn = server.await.unwrap();

    drop(client);
    let mut buf = [0u8; 1];
    let n = conn.reader.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);
}
