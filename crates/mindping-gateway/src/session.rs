use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use mindping_db::Database;
use mindping_types::events::{ClientFrame, SendPayload, ServerFrame};
use mindping_types::models::Message;

use crate::registry::{ChannelHandle, Registry};

/// Sent when the store fails underneath a request.
pub const GENERIC_ERROR: &str = "An error occurred processing your request";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { user_id: i64 },
}

/// Server-side state for one open channel.
///
/// Frames are handled one at a time; every store and registry call made for
/// a frame completes before the next frame is looked at. Nothing in here
/// can end the channel: bad input becomes an `error` frame or is dropped.
pub struct Session {
    channel: ChannelHandle,
    registry: Registry,
    db: Arc<Database>,
    state: SessionState,
}

impl Session {
    pub fn new(channel: ChannelHandle, registry: Registry, db: Arc<Database>) -> Self {
        Self {
            channel,
            registry,
            db,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user_id(&self) -> Option<i64> {
        match self.state {
            SessionState::Authenticated { user_id } => Some(user_id),
            SessionState::Unauthenticated => None,
        }
    }

    /// Handle one text frame from the client.
    pub async fn handle_text(&mut self, text: &str) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    "bad frame on {}: {} -- raw: {}",
                    self.channel.conn_id(),
                    e,
                    truncate(text, 200)
                );
                self.reply(ServerFrame::error(format!("Invalid frame: {}", e)));
                return;
            }
        };

        match (self.state, frame) {
            (SessionState::Unauthenticated, ClientFrame::Authenticate { user_id }) => {
                self.authenticate(user_id).await;
            }
            (SessionState::Unauthenticated, ClientFrame::Message { .. }) => {
                debug!(
                    "dropping message frame on unauthenticated channel {}",
                    self.channel.conn_id()
                );
            }
            (SessionState::Authenticated { user_id }, ClientFrame::Authenticate { user_id: requested }) => {
                debug!(
                    "user {} sent authenticate({}) on an authenticated channel, ignoring",
                    user_id, requested
                );
            }
            (SessionState::Authenticated { user_id }, ClientFrame::Message { payload }) => {
                self.send_message(user_id, payload).await;
            }
        }
    }

    /// Binary frames have no meaning in this protocol.
    pub fn handle_binary(&self, len: usize) {
        warn!("binary frame ({} bytes) on {}", len, self.channel.conn_id());
        self.reply(ServerFrame::error("Binary frames are not supported"));
    }

    /// Release the registry binding, unless a newer channel has taken it.
    pub async fn close(self) {
        if let SessionState::Authenticated { user_id } = self.state {
            if self.registry.unbind(user_id, &self.channel).await {
                debug!("user {} unbound from {}", user_id, self.channel.conn_id());
            } else {
                debug!(
                    "user {} already rebound, leaving newer channel in place",
                    user_id
                );
            }
        }
    }

    async fn authenticate(&mut self, user_id: i64) {
        if let Some(previous) = self.registry.bind(user_id, self.channel.clone()).await {
            info!(
                "user {} reconnected, {} supersedes {}",
                user_id,
                self.channel.conn_id(),
                previous.conn_id()
            );
        }
        self.state = SessionState::Authenticated { user_id };
        info!("user {} authenticated on {}", user_id, self.channel.conn_id());

        match self.db.call(move |db| db.get_unseen_count(user_id)).await {
            Ok(count) => {
                self.reply(ServerFrame::Notifications { count });
            }
            Err(e) => {
                error!("unseen count for {} failed: {}", user_id, e);
                self.reply(ServerFrame::error(GENERIC_ERROR));
            }
        }
    }

    async fn send_message(&self, sender_id: i64, payload: serde_json::Value) {
        let payload = match SendPayload::from_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("user {} sent invalid payload: {}", sender_id, e);
                self.reply(ServerFrame::error(e.to_string()));
                return;
            }
        };

        let stored = self
            .db
            .call(move |db| {
                db.create_message(sender_id, payload.recipient_id, payload.kind, &payload.content)
            })
            .await;
        let message = match stored {
            Ok(message) => message,
            Err(e) => {
                error!("storing message from {} failed: {}", sender_id, e);
                self.reply(ServerFrame::error(GENERIC_ERROR));
                return;
            }
        };

        info!(
            "user {} -> user {}: {} #{}",
            sender_id, message.recipient_id, message.kind, message.id
        );

        self.reply(ServerFrame::MessageSent {
            message: message.clone(),
        });
        self.notify_recipient(message).await;
    }

    /// Best-effort live push. Offline or closed recipients get nothing.
    async fn notify_recipient(&self, message: Message) {
        let recipient_id = message.recipient_id;
        let Some(channel) = self.registry.lookup(recipient_id).await else {
            debug!("user {} offline, message #{} not pushed", recipient_id, message.id);
            return;
        };
        if !channel.is_open() {
            debug!("channel for user {} is closed, skipping push", recipient_id);
            return;
        }

        if !channel.send(ServerFrame::NewMessage { message }) {
            return;
        }

        match self.db.call(move |db| db.get_unseen_count(recipient_id)).await {
            Ok(count) => {
                channel.send(ServerFrame::Notifications { count });
            }
            Err(e) => error!("unseen count for {} failed: {}", recipient_id, e),
        }
    }

    fn reply(&self, frame: ServerFrame) {
        if !self.channel.send(frame) {
            trace!("reply dropped, channel {} closed", self.channel.conn_id());
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
