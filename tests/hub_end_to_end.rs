//! End-to-end tests driving the hub with real WebSocket clients

use futures::{SinkExt, StreamExt};
use lancast_hub::{BroadcastHub, HubEvent};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn connect(port: u16) -> Client {
    let (client, _) = timeout(WAIT, connect_async(format!("ws://127.0.0.1:{port}")))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    client
}

/// Waits for the next connection-count event and returns its value.
async fn next_count(events: &async_channel::Receiver<HubEvent>) -> usize {
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for a hub event")
            .expect("event channel closed");
        if let HubEvent::ConnectionCountChanged { count } = event {
            return count;
        }
    }
}

/// Reads frames until a text frame arrives, returning its payload.
async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection ended")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return text.to_string();
        }
    }
}

#[tokio::test]
async fn status_reaches_every_client() {
    let hub = BroadcastHub::new();
    let events = hub.event_receiver();

    assert!(hub.start_listening(18090).await);
    assert_eq!(hub.listening_port(), 18090);

    let mut first = connect(18090).await;
    let mut second = connect(18090).await;
    assert_eq!(next_count(&events).await, 1);
    assert_eq!(next_count(&events).await, 2);
    assert_eq!(hub.connection_count(), 2);

    let status = json!({"isOnline": true, "notifications": []});
    let expected = lancast_status::flatten(&status);
    hub.submit_status(status, false);

    for client in [&mut first, &mut second] {
        let frame = next_text(client).await;
        let flat: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(flat["is_online"], json!(true));
        assert_eq!(flat["notifications_count"], json!(0));
        assert_eq!(flat["notification_category"], json!(""));
        // the wire frame is exactly the flattener's output
        assert_eq!(flat, Value::Object(expected.clone()));
    }

    second.close(None).await.unwrap();
    assert_eq!(next_count(&events).await, 1);
    assert_eq!(hub.connection_count(), 1);

    hub.shutdown().await;
}

#[tokio::test]
async fn count_tracks_accepts_and_disconnects() {
    let hub = BroadcastHub::new();
    let events = hub.event_receiver();
    assert!(hub.start_listening(18091).await);

    let mut clients = Vec::new();
    for expected in 1..=3 {
        clients.push(connect(18091).await);
        assert_eq!(next_count(&events).await, expected);
    }

    for expected in (1..=2).rev() {
        let mut client = clients.pop().unwrap();
        client.close(None).await.unwrap();
        assert_eq!(next_count(&events).await, expected);
    }
    assert_eq!(hub.connection_count(), 1);

    hub.shutdown().await;
}

#[tokio::test]
async fn stop_listening_closes_all_clients_and_fires_once() {
    let hub = BroadcastHub::new();
    let events = hub.event_receiver();
    assert!(hub.start_listening(18092).await);

    let _first = connect(18092).await;
    let _second = connect(18092).await;
    assert_eq!(next_count(&events).await, 1);
    assert_eq!(next_count(&events).await, 2);

    hub.stop_listening().await;
    assert_eq!(next_count(&events).await, 0);
    assert_eq!(hub.connection_count(), 0);
    assert!(!hub.is_listening());
    assert_eq!(hub.listening_port(), 0);

    // exactly one count event for the teardown
    assert!(timeout(Duration::from_millis(200), events.recv())
        .await
        .is_err());

    // stopping again emits nothing: there was nothing to remove
    hub.stop_listening().await;
    assert!(timeout(Duration::from_millis(200), events.recv())
        .await
        .is_err());

    hub.shutdown().await;
}

#[tokio::test]
async fn dedupe_and_throttle_suppress_over_the_wire() {
    let hub = BroadcastHub::new();
    let events = hub.event_receiver();
    assert!(hub.start_listening(18093).await);

    let mut client = connect(18093).await;
    assert_eq!(next_count(&events).await, 1);

    let online = json!({"isOnline": true, "notifications": []});
    let offline = json!({"isOnline": false, "notifications": []});

    hub.submit_status(online.clone(), false);
    let first: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(first["is_online"], json!(true));

    // identical document: deduped; changed document: inside the interval
    hub.submit_status(online.clone(), false);
    hub.submit_status(offline.clone(), false);

    // forced send goes through regardless
    hub.submit_status(offline, true);
    let second: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(second["is_online"], json!(false));

    // nothing else arrives: the suppressed submissions were dropped
    assert!(timeout(Duration::from_millis(200), client.next())
        .await
        .is_err());

    hub.shutdown().await;
}

#[tokio::test]
async fn broadcasts_and_inbound_messages_flow_both_ways() {
    let hub = BroadcastHub::new();
    let events = hub.event_receiver();
    assert!(hub.start_listening(18094).await);

    let mut client = connect(18094).await;
    assert_eq!(next_count(&events).await, 1);

    hub.broadcast_text("hello clients");
    assert_eq!(next_text(&mut client).await, "hello clients");

    hub.broadcast_json(&json!({"kind": "ad-hoc", "n": 1}));
    let frame: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(frame["kind"], json!("ad-hoc"));
    assert_eq!(frame["n"], json!(1));

    client
        .send(Message::Text("from the client".into()))
        .await
        .unwrap();
    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    match event {
        HubEvent::MessageReceived { text, .. } => assert_eq!(text, "from the client"),
        other => panic!("unexpected event: {other:?}"),
    }

    hub.shutdown().await;
}
