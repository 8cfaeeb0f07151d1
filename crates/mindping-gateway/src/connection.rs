use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, warn};

use mindping_db::Database;

use crate::registry::{ChannelHandle, Registry};
use crate::session::Session;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one WebSocket from open to close.
///
/// A writer task drains the channel's queue onto the socket in order. The
/// read loop hands each frame to the session and waits for it to finish
/// before reading the next one.
pub async fn handle_connection(socket: WebSocket, registry: Registry, db: Arc<Database>) {
    let (mut sender, mut receiver) = socket.split();

    let (channel, mut outbound) = ChannelHandle::open();
    let conn_id = channel.conn_id();
    let mut session = Session::new(channel, registry, db);

    info!("channel {} opened", conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                frame = outbound.recv() => {
                    let Some(frame) = frame else { break };
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("failed to encode frame for {}: {}", conn_id, e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout on {} (missed {} pongs), dropping connection", conn_id, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            incoming = receiver.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    _ => break,
                };
                match msg {
                    Message::Text(text) => session.handle_text(text.as_str()).await,
                    Message::Binary(data) => session.handle_binary(data.len()),
                    Message::Pong(_) => pong_received.store(true, Ordering::Release),
                    Message::Close(_) => break,
                    Message::Ping(_) => {}
                }
            }
        }
    }

    send_task.abort();

    match session.user_id() {
        Some(user_id) => info!("user {} disconnected from {}", user_id, conn_id),
        None => info!("channel {} closed before authenticating", conn_id),
    }
    session.close().await;
}
