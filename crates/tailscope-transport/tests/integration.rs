//! Integration tests for the HTTP transport
//!
//! Each test runs a one-shot HTTP/1.1 responder on a loopback socket and
//! checks both what the transport sent and how it classified the reply.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use tailscope_core::{AuthToken, Cursor, FetchErrorKind, FetchRequest, FetchTransport};
use tailscope_transport::{HttpTransport, HttpTransportConfig};

/// Serve one canned response; yields the raw request head
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_head(&mut socket).await;
        let _ = tx.send(head);

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });

    (base, rx)
}

/// Accept one connection and never answer it
async fn serve_silence() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_head(&mut socket).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    base
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn transport(base: &str) -> HttpTransport {
    HttpTransport::new(
        HttpTransportConfig::new(base).with_request_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetch_sends_cursor_and_bearer_token() {
    let (base, head) = serve_once(
        "200 OK",
        r#"{"events":[{"timestamp":5,"category":"mutation","status":"error","payload":{"path":"todos:add","error":"quota"}}],"nextCursor":"n-2"}"#,
    )
    .await;

    let token = AuthToken::new("s3cret");
    let cursor = Cursor::from("n-1");
    let batch = transport(&base)
        .fetch_batch(
            FetchRequest { cursor: Some(&cursor), auth_token: &token },
            CancellationToken::new(),
        )
        .await;
    let batch = assert_ok!(batch);

    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.events[0].payload.error_text(), Some("quota"));
    assert_eq!(batch.next_cursor, Cursor::from("n-2"));

    let head = head.await.unwrap();
    let request_line = head.lines().next().unwrap();
    assert_eq!(request_line, "GET /api/stream_events?cursor=n-1 HTTP/1.1");
    assert!(
        head.lines()
            .any(|l| l.eq_ignore_ascii_case("authorization: Bearer s3cret"))
    );
}

#[tokio::test]
async fn test_first_fetch_has_no_cursor() {
    let (base, head) = serve_once("200 OK", r#"{"events":[],"nextCursor":0}"#).await;
    let token = AuthToken::new("t");

    let batch = transport(&base)
        .fetch_batch(FetchRequest { cursor: None, auth_token: &token }, CancellationToken::new())
        .await;
    assert_eq!(assert_ok!(batch).next_cursor, Cursor::from(0));

    let head = head.await.unwrap();
    assert!(head.starts_with("GET /api/stream_events HTTP/1.1"));
}

#[tokio::test]
async fn test_unauthorized_is_auth_failure() {
    let (base, _head) = serve_once("401 Unauthorized", r#"{"code":"BadAdminKey"}"#).await;
    let token = AuthToken::new("wrong");

    let result = transport(&base)
        .fetch_batch(FetchRequest { cursor: None, auth_token: &token }, CancellationToken::new())
        .await;
    let err = assert_err!(result);
    assert_eq!(err.kind(), FetchErrorKind::Auth);
    assert!(err.to_string().contains("BadAdminKey"));
}

#[tokio::test]
async fn test_server_error_is_network_failure() {
    let (base, _head) = serve_once("503 Service Unavailable", "").await;
    let token = AuthToken::new("t");

    let result = transport(&base)
        .fetch_batch(FetchRequest { cursor: None, auth_token: &token }, CancellationToken::new())
        .await;
    assert_eq!(assert_err!(result).kind(), FetchErrorKind::Network);
}

#[tokio::test]
async fn test_malformed_body_is_parse_failure() {
    let (base, _head) = serve_once("200 OK", r#"{"events": "nope"}"#).await;
    let token = AuthToken::new("t");

    let result = transport(&base)
        .fetch_batch(FetchRequest { cursor: None, auth_token: &token }, CancellationToken::new())
        .await;
    assert_eq!(assert_err!(result).kind(), FetchErrorKind::Parse);
}

#[tokio::test]
async fn test_connection_refused_is_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let token = AuthToken::new("t");

    let result = transport(&base)
        .fetch_batch(FetchRequest { cursor: None, auth_token: &token }, CancellationToken::new())
        .await;
    assert_eq!(assert_err!(result).kind(), FetchErrorKind::Network);
}

#[tokio::test]
async fn test_timeout_is_network_failure() {
    let base = serve_silence().await;
    let transport = HttpTransport::new(
        HttpTransportConfig::new(&base).with_request_timeout(Duration::from_millis(200)),
    )
    .unwrap();
    let token = AuthToken::new("t");

    let result = transport
        .fetch_batch(FetchRequest { cursor: None, auth_token: &token }, CancellationToken::new())
        .await;
    let err = assert_err!(result);
    assert_eq!(err.kind(), FetchErrorKind::Network);
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_cancellation_aborts_request() {
    let base = serve_silence().await;
    let transport = transport(&base);
    let token = AuthToken::new("t");
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = transport
        .fetch_batch(FetchRequest { cursor: None, auth_token: &token }, cancel)
        .await;
    let err = assert_err!(result);
    assert!(err.to_string().contains("aborted"));
}
