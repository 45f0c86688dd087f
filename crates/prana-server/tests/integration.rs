//! End-to-end tests exercising the gateway over real WebSocket connections.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use prana_server::{PranaServer, ServerConfig};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn boot_server(config: ServerConfig) -> (PranaServer, SocketAddr) {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let server = PranaServer::new(config, handle);
    let (addr, _task) = server.listen().await.unwrap();
    (server, addr)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _resp) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Read frames until a text frame arrives, parsed as JSON. Transport pings
/// from the liveness probe are skipped.
async fn read_json(ws: &mut WsClient) -> Value {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).unwrap();
                }
                Some(Ok(_)) => {}
                other => panic!("connection ended while waiting for text: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a text frame")
}

#[tokio::test]
async fn greeting_sent_on_connect() {
    let (_server, addr) = boot_server(ServerConfig::default()).await;
    let mut ws = connect(addr).await;

    let greeting = read_json(&mut ws).await;
    assert_eq!(greeting["type"], "CONNECTION_ESTABLISHED");
    assert_eq!(greeting["message"], "Connected to Prana realtime channel");
    assert!(greeting["timestamp"].is_string());
}

#[tokio::test]
async fn ping_answered_with_pong_echoing_timestamp() {
    let (_server, addr) = boot_server(ServerConfig::default()).await;
    let mut ws = connect(addr).await;
    let _greeting = read_json(&mut ws).await;

    let ping = json!({"type": "PING", "data": {"timestamp": 1234}}).to_string();
    ws.send(Message::Text(ping.into())).await.unwrap();

    let pong = read_json(&mut ws).await;
    assert_eq!(pong["type"], "PONG");
    assert_eq!(pong["data"]["timestamp"], 1234);
    assert!(pong["timestamp"].is_string());
}

#[tokio::test]
async fn keepalive_stays_private_to_the_channel() {
    let (_server, addr) = boot_server(ServerConfig::default()).await;
    let mut quiet = connect(addr).await;
    let _ = read_json(&mut quiet).await;
    let mut noisy = connect(addr).await;
    let _ = read_json(&mut noisy).await;

    let ping = json!({"type": "PING", "data": {"timestamp": 7}}).to_string();
    noisy.send(Message::Text(ping.into())).await.unwrap();
    let pong = read_json(&mut noisy).await;
    assert_eq!(pong["type"], "PONG");

    // The quiet channel must see nothing from the exchange.
    let leaked = tokio::time::timeout(Duration::from_millis(300), quiet.next()).await;
    assert!(leaked.is_err(), "keepalive leaked to another channel");
}

#[tokio::test]
async fn inbound_event_acknowledged_with_message_received() {
    let (_server, addr) = boot_server(ServerConfig::default()).await;
    let mut ws = connect(addr).await;
    let _greeting = read_json(&mut ws).await;

    let event = json!({"type": "CART_SYNC", "data": {"items": 3}}).to_string();
    ws.send(Message::Text(event.into())).await.unwrap();

    let ack = read_json(&mut ws).await;
    assert_eq!(ack["type"], "MESSAGE_RECEIVED");
    assert_eq!(ack["data"]["type"], "CART_SYNC");
    assert_eq!(ack["data"]["data"]["items"], 3);
}

#[tokio::test]
async fn malformed_json_is_dropped_and_connection_survives() {
    let (_server, addr) = boot_server(ServerConfig::default()).await;
    let mut ws = connect(addr).await;
    let _greeting = read_json(&mut ws).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();

    // Connection still works afterwards.
    let ping = json!({"type": "PING", "data": {"timestamp": 1}}).to_string();
    ws.send(Message::Text(ping.into())).await.unwrap();
    let pong = read_json(&mut ws).await;
    assert_eq!(pong["type"], "PONG");
}

#[tokio::test]
async fn broadcast_reaches_every_open_channel_once() {
    let (server, addr) = boot_server(ServerConfig::default()).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut ws = connect(addr).await;
        let _ = read_json(&mut ws).await;
        clients.push(ws);
    }
    assert_eq!(server.hub().connection_count().await, 3);

    server
        .hub()
        .broadcast(json!({"id": "p1", "name": "Mask"}), "PRODUCT_CREATED")
        .await;

    for ws in &mut clients {
        let msg = read_json(ws).await;
        assert_eq!(msg["type"], "PRODUCT_CREATED");
        assert_eq!(msg["data"]["id"], "p1");
        assert_eq!(msg["data"]["name"], "Mask");
        assert!(msg["timestamp"].is_string());

        // Exactly once: nothing further pending.
        let extra = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
        assert!(extra.is_err(), "channel received the broadcast twice");
    }
}

#[tokio::test]
async fn closed_channel_is_forgotten() {
    let (server, addr) = boot_server(ServerConfig::default()).await;
    let mut staying = connect(addr).await;
    let _ = read_json(&mut staying).await;
    let mut leaving = connect(addr).await;
    let _ = read_json(&mut leaving).await;
    assert_eq!(server.hub().connection_count().await, 2);

    leaving.close(None).await.unwrap();
    wait_for_count(&server, 1).await;

    server.hub().broadcast(json!({"id": "p2"}), "PRODUCT_UPDATED").await;
    let msg = read_json(&mut staying).await;
    assert_eq!(msg["type"], "PRODUCT_UPDATED");
}

#[tokio::test]
async fn notify_endpoint_fans_out() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let (server, addr) = boot_server(ServerConfig::default()).await;
    let mut ws = connect(addr).await;
    let _ = read_json(&mut ws).await;

    let body = json!({
        "type": "PRODUCT_DELETED",
        "data": {"productId": "p9", "name": "Filter"}
    });
    let req = Request::builder()
        .method("POST")
        .uri("/internal/notify")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = server.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let msg = read_json(&mut ws).await;
    assert_eq!(msg["type"], "PRODUCT_DELETED");
    assert_eq!(msg["data"], json!({"productId": "p9"}));
}

#[tokio::test]
async fn silent_channel_terminated_after_two_probe_cycles() {
    let config = ServerConfig {
        probe_interval_secs: 1,
        ..ServerConfig::default()
    };
    let (server, addr) = boot_server(config).await;

    // Connect raw and never read, so the client library never answers the
    // transport pings.
    let ws = connect(addr).await;
    wait_for_count(&server, 1).await;

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(server.hub().connection_count().await, 0);
    drop(ws);
}

#[tokio::test]
async fn responsive_channel_survives_probe_cycles() {
    let config = ServerConfig {
        probe_interval_secs: 1,
        ..ServerConfig::default()
    };
    let (server, addr) = boot_server(config).await;

    let mut ws = connect(addr).await;
    let _ = read_json(&mut ws).await;

    // Keep reading; the client library answers transport pings as it reads.
    let reader = tokio::spawn(async move { while ws.next().await.is_some() {} });

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(server.hub().connection_count().await, 1);
    reader.abort();
}

#[tokio::test]
async fn connection_limit_refuses_extra_channels() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let (server, addr) = boot_server(config).await;

    let mut first = connect(addr).await;
    let _ = read_json(&mut first).await;
    assert_eq!(server.hub().connection_count().await, 1);

    let err = connect_async(format!("ws://{addr}/ws")).await;
    assert!(err.is_err(), "second connection should be refused");
}

async fn wait_for_count(server: &PranaServer, expected: usize) {
    for _ in 0..50 {
        if server.hub().connection_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "hub never reached {expected} channels, saw {}",
        server.hub().connection_count().await
    );
}
