use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use mindping_types::events::ServerFrame;

/// The writable end of one open WebSocket.
///
/// Frames pushed here are written to the socket in order by the
/// connection's writer task. `conn_id` is the channel's identity.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl ChannelHandle {
    /// Open a fresh channel. The receiver feeds the socket writer.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// False once the writer side has gone away.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a frame. Returns false if the channel is closed; callers
    /// treat that as "delivered to nobody".
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.tx.send(frame).is_ok()
    }

    pub fn same_channel(&self, other: &ChannelHandle) -> bool {
        self.conn_id == other.conn_id
    }
}

/// Maps each user id to at most one live channel.
///
/// Binding replaces any earlier channel for the same user without closing
/// it. Unbinding is guarded so a stale channel can never remove its
/// replacement.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<i64, ChannelHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `channel` the live channel for `user_id`. Returns the channel it
    /// replaced, if any.
    pub async fn bind(&self, user_id: i64, channel: ChannelHandle) -> Option<ChannelHandle> {
        self.inner.write().await.insert(user_id, channel)
    }

    pub async fn lookup(&self, user_id: i64) -> Option<ChannelHandle> {
        self.inner.read().await.get(&user_id).cloned()
    }

    /// Remove the binding only if `channel` is still the one bound.
    /// Returns whether anything was removed.
    pub async fn unbind(&self, user_id: i64, channel: &ChannelHandle) -> bool {
        let mut channels = self.inner.write().await;
        match channels.get(&user_id) {
            Some(current) if current.same_channel(channel) => {
                channels.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    pub async fn online_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_returns_bound_channel() {
        let registry = Registry::new();
        let (c1, _rx1) = ChannelHandle::open();

        assert!(registry.lookup(1).await.is_none());
        registry.bind(1, c1.clone()).await;

        let found = registry.lookup(1).await.unwrap();
        assert!(found.same_channel(&c1));
        assert!(registry.lookup(2).await.is_none());
    }

    #[tokio::test]
    async fn rebind_replaces_and_stale_unbind_is_noop() {
        let registry = Registry::new();
        let (c1, _rx1) = ChannelHandle::open();
        let (c2, _rx2) = ChannelHandle::open();

        registry.bind(7, c1.clone()).await;
        let replaced = registry.bind(7, c2.clone()).await.unwrap();
        assert!(replaced.same_channel(&c1));
        assert!(registry.lookup(7).await.unwrap().same_channel(&c2));

        assert!(!registry.unbind(7, &c1).await);
        assert!(registry.lookup(7).await.unwrap().same_channel(&c2));

        assert!(registry.unbind(7, &c2).await);
        assert!(registry.lookup(7).await.is_none());
        assert_eq!(registry.online_count().await, 0);
    }

    #[tokio::test]
    async fn replaced_channel_is_not_closed() {
        let registry = Registry::new();
        let (c1, mut rx1) = ChannelHandle::open();
        let (c2, _rx2) = ChannelHandle::open();

        registry.bind(3, c1.clone()).await;
        registry.bind(3, c2).await;

        assert!(c1.is_open());
        assert!(c1.send(ServerFrame::Notifications { count: 0 }));
        assert_eq!(rx1.recv().await, Some(ServerFrame::Notifications { count: 0 }));
    }

    #[tokio::test]
    async fn handle_reports_closed_after_receiver_drops() {
        let (channel, rx) = ChannelHandle::open();
        assert!(channel.is_open());

        drop(rx);
        assert!(!channel.is_open());
        assert!(!channel.send(ServerFrame::error("gone")));
    }
}
