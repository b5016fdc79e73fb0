#![allow(clippy::unwrap_used)]
// End-to-end mount/unmount of a `Tracker` against a wiremock directory
// authority and an in-process Socket.IO presence server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use roomtrack_core::{CoreError, ReconnectPolicy, Tracker, TrackerConfig};

const WAIT: Duration = Duration::from_secs(5);

/// Serve one Socket.IO session: handshake, one snapshot, then idle until
/// the client leaves. Reports every text frame the client sent.
async fn presence_server(listener: TcpListener, done: oneshot::Sender<Vec<String>>) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    ws.send(Message::text(
        r#"0{"sid":"e1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#,
    ))
    .await
    .unwrap();

    let mut received = Vec::new();
    while let Some(Ok(frame)) = ws.next().await {
        let Message::Text(text) = frame else { break };
        let text = text.to_string();
        if text == "40" {
            ws.send(Message::text(r#"40{"sid":"s1"}"#)).await.unwrap();
            let snapshot = json!(["updatePersons", [
                { "deviceID": "dev-1", "name": "Alice", "status": "Online", "room": "Kitchen" },
                { "deviceID": "dev-9", "name": "Mallory", "status": "Offline", "room": null }
            ]]);
            ws.send(Message::text(format!("42{snapshot}"))).await.unwrap();
        }
        received.push(text);
    }
    let _ = done.send(received);
}

#[tokio::test]
async fn test_mount_reconcile_unmount() {
    let directory = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "1", "name": "Living Room", "deviceID": "dev-1" },
            { "_id": "2", "name": "Garage", "deviceID": "dev-2" }
        ])))
        .mount(&directory)
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    let (done_tx, done_rx) = oneshot::channel();
    let server = tokio::spawn(presence_server(listener, done_tx));

    let mut config = TrackerConfig::new(
        Url::parse(&format!("{}/api", directory.uri())).unwrap(),
        socket_url,
    );
    config.reconnect = ReconnectPolicy {
        enabled: false,
        ..ReconnectPolicy::default()
    };

    let tracker = Tracker::new(config).unwrap();
    let mut presence = tracker.presence().subscribe();

    let rooms = tracker.mount().await.unwrap();
    assert_eq!(rooms.len(), 2);

    let snapshot = tokio::time::timeout(WAIT, presence.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(tracker.presence().is_connected());

    let joined = tracker.reconciliation();
    assert_eq!(joined.paired.len(), 1);
    assert_eq!(joined.paired[0].device.id, "1");
    assert_eq!(joined.unseen[0].id, "2");
    assert_eq!(joined.orphans[0].device_id, "dev-9");

    // Mounting again is a no-op for the channel.
    tracker.presence().connect().await.unwrap();

    tracker.unmount().await;
    let status = tracker.presence().status();
    assert!(!status.connected);
    assert!(status.stale);
    assert_eq!(tracker.presence().snapshot().len(), 2);
    assert!(tracker.directory().is_detached());

    let received = tokio::time::timeout(WAIT, done_rx).await.unwrap().unwrap();
    assert_eq!(received, ["40", "41"]);
    server.await.unwrap();
}

#[tokio::test]
async fn test_unmount_discards_directory_response_during_teardown() {
    let directory = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "1", "name": "Living Room", "deviceID": "dev-1" }
        ])))
        .up_to_n_times(1)
        .mount(&directory)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/rooms"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&directory)
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    let (done_tx, done_rx) = oneshot::channel();
    let server = tokio::spawn(presence_server(listener, done_tx));

    let mut config = TrackerConfig::new(
        Url::parse(&format!("{}/api", directory.uri())).unwrap(),
        socket_url,
    );
    config.reconnect = ReconnectPolicy {
        enabled: false,
        ..ReconnectPolicy::default()
    };
    let tracker = Tracker::new(config).unwrap();
    let mut presence = tracker.presence().subscribe();
    tracker.mount().await.unwrap();
    tokio::time::timeout(WAIT, presence.changed())
        .await
        .unwrap()
        .unwrap();

    let refresh = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.directory().list().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(tracker.directory().status().loading);

    let unmount = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.unmount().await })
    };
    tokio::task::yield_now().await;
    // The directory is detached before the channel teardown is awaited.
    assert!(tracker.directory().is_detached());

    let refreshed = refresh.await.unwrap();
    assert!(matches!(refreshed, Err(CoreError::Detached)));
    assert_eq!(tracker.directory().len(), 1);

    unmount.await.unwrap();
    let received = tokio::time::timeout(WAIT, done_rx).await.unwrap().unwrap();
    assert_eq!(received, ["40", "41"]);
    server.await.unwrap();
}
