#![allow(clippy::unwrap_used)]
// Loopback tests for `WsConnection` against a local tokio-tungstenite server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use duosync_api::{CloseReason, ConnectionState, TaggedEvent, TransportEvent, WsConnection};

async fn next_event(rx: &mut mpsc::Receiver<TaggedEvent>) -> TaggedEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

/// Accept one client, push a status frame, wait for one client frame,
/// then close with 1000. The received client frame is reported back.
async fn spawn_server() -> (Url, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        ws.send(Message::text(
            r#"{"type":"device_update","device_id":"a","ison":false}"#,
        ))
        .await
        .unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            if let Message::Text(text) = frame {
                let _ = seen_tx.send(text.as_str().to_owned());
                break;
            }
        }

        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        }))
        .await
        .unwrap();
    });

    let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
    (url, seen_rx)
}

#[tokio::test]
async fn full_lifecycle_against_loopback_server() {
    let (url, seen_rx) = spawn_server().await;
    let (tx, mut rx) = mpsc::channel(16);

    let mut conn = WsConnection::new(url);
    conn.connect(3, tx).unwrap();

    let opened = next_event(&mut rx).await;
    assert_eq!(opened.id, 3);
    assert_eq!(opened.event, TransportEvent::Opened);
    assert_eq!(conn.state(), ConnectionState::Open);

    let message = next_event(&mut rx).await;
    assert_eq!(
        message.event,
        TransportEvent::Message(r#"{"type":"device_update","device_id":"a","ison":false}"#.into())
    );

    assert!(conn.send(r#"{"type":"request_status"}"#));
    let seen = tokio::time::timeout(Duration::from_secs(5), seen_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, r#"{"type":"request_status"}"#);

    let closed = next_event(&mut rx).await;
    assert_eq!(
        closed.event,
        TransportEvent::Closed(CloseReason::Remote {
            code: Some(1000),
            reason: "bye".into(),
        })
    );
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(!conn.send("too late"));
}

#[tokio::test]
async fn local_close_reports_local_reason() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        // Drain until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, mut rx) = mpsc::channel(16);
    let mut conn = WsConnection::new(Url::parse(&format!("ws://{addr}/ws")).unwrap());
    conn.connect(1, tx).unwrap();
    assert_eq!(next_event(&mut rx).await.event, TransportEvent::Opened);

    conn.close();
    conn.close();

    assert_eq!(
        next_event(&mut rx).await.event,
        TransportEvent::Closed(CloseReason::Local)
    );
}

#[tokio::test]
async fn stalled_upgrade_times_out_as_connect_failure() {
    // Accepts TCP and holds the sockets without ever answering the upgrade.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });

    let (tx, mut rx) = mpsc::channel(16);
    let mut conn = WsConnection::new(Url::parse(&format!("ws://{addr}/ws")).unwrap())
        .with_handshake_timeout(Duration::from_millis(200));
    conn.connect(4, tx).unwrap();
    assert_eq!(conn.state(), ConnectionState::Connecting);

    let closed = next_event(&mut rx).await;
    assert_eq!(closed.id, 4);
    assert_eq!(
        closed.event,
        TransportEvent::Closed(CloseReason::ConnectFailed("handshake timed out".into()))
    );
    assert_eq!(conn.state(), ConnectionState::Closed);
}
