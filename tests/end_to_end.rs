//! End-to-end tests for the gateway
//!
//! Each test starts a real `GatewayServer` on a loopback port and talks to
//! it with a tokio-tungstenite client:
//! 1. Echo round-trip through an IPv4 target
//! 2. Domain targets resolve and relay
//! 3. Wrong identity gets no bytes back
//! 4. Unreachable target gets the error ack and close 1011
//! 5. Long domain names still get a well-formed close 1011
//! 6. Plain HTTP requests get 400

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use tunnelgate_core::{Identity, ATYP_DOMAIN, ATYP_IPV4};
use tunnelgate_daemon::{GatewayServer, NOT_UPGRADE_BODY};
use tunnelgate_exit::{SessionHandler, TcpConnector, CLOSE_INTERNAL_ERROR, MAX_CLOSE_REASON_LEN};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TOKEN: &str = "d342d11e-d424-4583-b36e-524ab1f0afa4";
const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// HELPERS
// =============================================================================

/// Running gateway; dropping it stops the server
struct Gateway {
    addr: SocketAddr,
    _stop: oneshot::Sender<()>,
}

async fn start_gateway() -> Gateway {
    let identity = Identity::from_token(TOKEN).unwrap();
    let handler = Arc::new(SessionHandler::new(
        identity,
        TcpConnector::new(Duration::from_secs(2)),
    ));
    let server = GatewayServer::bind_with("127.0.0.1:0".parse().unwrap(), handler)
        .await
        .unwrap();
    let addr = server.local_addr();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));

    Gateway { addr, _stop: stop }
}

/// TCP server that echoes every connection back to itself
async fn start_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    addr
}

/// Port with nothing listening on it
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn header(id: &[u8; 16], port: u16, atyp: u8, addr: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut msg = vec![0u8];
    msg.extend_from_slice(id);
    msg.push(0); // no addons
    msg.push(1); // command
    msg.extend_from_slice(&port.to_be_bytes());
    msg.push(atyp);
    if atyp == ATYP_DOMAIN {
        msg.push(addr.len() as u8);
    }
    msg.extend_from_slice(addr);
    msg.extend_from_slice(payload);
    msg
}

fn token_bytes() -> [u8; 16] {
    *Identity::from_token(TOKEN).unwrap().as_bytes()
}

async fn open(gateway: &Gateway) -> Client {
    let (client, _) = connect_async(format!("ws://{}/", gateway.addr)).await.unwrap();
    client
}

async fn next_message(client: &mut Client) -> Option<Message> {
    match tokio::time::timeout(WAIT, client.next()).await {
        Ok(Some(Ok(msg))) => Some(msg),
        Ok(_) => None,
        Err(_) => panic!("timed out waiting for the gateway"),
    }
}

/// Collect binary payload until `len` bytes have arrived
async fn read_exact(client: &mut Client, len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    while out.len() < len {
        match next_message(client).await {
            Some(Message::Binary(data)) => out.extend_from_slice(&data),
            Some(Message::Ping(_)) | Some(Message::Pong(_)) => {}
            other => panic!("expected data, got {:?}", other),
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn test_ipv4_echo_round_trip() {
    let gateway = start_gateway().await;
    let echo = start_echo().await;
    let mut client = open(&gateway).await;

    let msg = header(&token_bytes(), echo.port(), ATYP_IPV4, &[127, 0, 0, 1], b"hello");
    client.send(Message::binary(msg)).await.unwrap();

    assert_eq!(read_exact(&mut client, 2).await, vec![0, 0]);
    assert_eq!(read_exact(&mut client, 5).await, b"hello");

    client.send(Message::binary(b" world".to_vec())).await.unwrap();
    assert_eq!(read_exact(&mut client, 6).await, b" world");

    client.close(None).await.unwrap();
}

#[tokio::test]
async fn test_domain_target_relays() {
    let gateway = start_gateway().await;
    let echo = start_echo().await;
    let mut client = open(&gateway).await;

    let msg = header(&token_bytes(), echo.port(), ATYP_DOMAIN, b"127.0.0.1", b"");
    client.send(Message::binary(msg)).await.unwrap();
    assert_eq!(read_exact(&mut client, 2).await, vec![0, 0]);

    client.send(Message::binary(b"ping".to_vec())).await.unwrap();
    assert_eq!(read_exact(&mut client, 4).await, b"ping");
}

#[tokio::test]
async fn test_wrong_identity_gets_no_bytes() {
    let gateway = start_gateway().await;
    let echo = start_echo().await;
    let mut client = open(&gateway).await;

    let msg = header(&[0xAB; 16], echo.port(), ATYP_IPV4, &[127, 0, 0, 1], b"hello");
    client.send(Message::binary(msg)).await.unwrap();

    while let Some(msg) = next_message(&mut client).await {
        match msg {
            Message::Binary(data) => panic!("unauthenticated peer received {:?}", data),
            Message::Close(_) => break,
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_unreachable_target_sends_error_ack() {
    let gateway = start_gateway().await;
    let port = closed_port().await;
    let mut client = open(&gateway).await;

    let msg = header(&token_bytes(), port, ATYP_IPV4, &[127, 0, 0, 1], b"");
    client.send(Message::binary(msg)).await.unwrap();

    assert_eq!(read_exact(&mut client, 2).await, vec![0, 1]);

    match next_message(&mut client).await {
        Some(Message::Close(Some(close))) => {
            assert_eq!(u16::from(close.code), CLOSE_INTERNAL_ERROR);
            assert!(close.reason.as_str().contains(&port.to_string()));
        }
        other => panic!("expected close 1011, got {:?}", other),
    }
}

#[tokio::test]
async fn test_long_domain_connect_failure_closes_cleanly() {
    let gateway = start_gateway().await;
    let mut client = open(&gateway).await;

    let domain = format!("{}.invalid", "d".repeat(190));
    let msg = header(&token_bytes(), 80, ATYP_DOMAIN, domain.as_bytes(), b"");
    client.send(Message::binary(msg)).await.unwrap();

    assert_eq!(read_exact(&mut client, 2).await, vec![0, 1]);

    match next_message(&mut client).await {
        Some(Message::Close(Some(close))) => {
            assert_eq!(u16::from(close.code), CLOSE_INTERNAL_ERROR);
            assert!(close.reason.as_str().len() <= MAX_CLOSE_REASON_LEN);
        }
        other => panic!("expected close 1011, got {:?}", other),
    }
}

#[tokio::test]
async fn test_plain_http_rejected() {
    let gateway = start_gateway().await;

    let response = reqwest::get(format!("http://{}/anything", gateway.addr))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(response.text().await.unwrap(), NOT_UPGRADE_BODY);
}
