#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use mindping_api::auth::{AppState, AppStateInner};
use mindping_db::Database;
use mindping_gateway::registry::Registry;
use mindping_types::events::ServerFrame;

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_SECRET: &str = "test-secret";

/// Serve the real router on an ephemeral port.
pub async fn spawn_server() -> (SocketAddr, AppState) {
    let db = Database::open_in_memory().unwrap();
    let state = AppStateInner::new(Arc::new(db), TEST_SECRET.into(), Registry::new());
    let app = mindping_server::app(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

pub async fn send_json(ws: &mut Ws, value: serde_json::Value) {
    ws.send(WsMessage::Text(value.to_string().into())).await.unwrap();
}

/// Open a channel and authenticate it, consuming the initial count frame.
pub async fn connect_as(addr: SocketAddr, user_id: i64) -> (Ws, u64) {
    let mut ws = connect(addr).await;
    send_json(&mut ws, serde_json::json!({ "type": "authenticate", "userId": user_id })).await;
    match next_frame(&mut ws).await {
        ServerFrame::Notifications { count } => (ws, count),
        other => panic!("expected notifications, got {:?}", other),
    }
}

/// Next text frame as untyped JSON, exactly as it came off the wire.
pub async fn next_value(ws: &mut Ws) -> serde_json::Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("socket error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

pub async fn next_frame(ws: &mut Ws) -> ServerFrame {
    serde_json::from_value(next_value(ws).await).unwrap()
}

/// Nothing arrives within a short window.
pub async fn assert_silent(ws: &mut Ws) {
    let res = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(res.is_err(), "unexpected frame: {:?}", res);
}
