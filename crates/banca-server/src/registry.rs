//! Live connection registry.
//!
//! Maps an authenticated user to the one WebSocket channel currently bound
//! to it. Binding a user again replaces the previous channel (newest wins);
//! the replaced channel stays open but no longer receives fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use banca_shared::types::{ConnectionId, UserId};
use banca_shared::ServerFrame;

/// Frames queued for one socket writer before pushes start failing.
pub const OUTBOUND_QUEUE_LEN: usize = 256;

/// Outbound side of one channel. Cloning it is cheap; every clone pushes
/// into the same socket writer.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ConnectionId,
    tx: mpsc::Sender<ServerFrame>,
}

impl ChannelHandle {
    /// Create a handle and the receiver the socket writer drains.
    pub fn open() -> (Self, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_LEN);
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame for this channel. Returns `false` if the channel has
    /// already closed or its client has stopped draining the queue; the
    /// frame is dropped in both cases.
    pub fn push(&self, frame: ServerFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection = %self.id.short(), "Outbound queue full, frame dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    channels: Arc<RwLock<HashMap<UserId, ChannelHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user` to `channel`, replacing any existing binding. Returns the
    /// replaced handle, if any.
    pub async fn bind(&self, user: UserId, channel: ChannelHandle) -> Option<ChannelHandle> {
        let connection = channel.id();
        let previous = self.channels.write().await.insert(user, channel);

        match &previous {
            Some(old) if old.id() != connection => info!(
                user_id = %user,
                old = %old.id().short(),
                new = %connection.short(),
                "Replaced live connection"
            ),
            _ => info!(user_id = %user, connection = %connection.short(), "User online"),
        }

        previous
    }

    /// Current live channel of `user`, if it is still open.
    pub async fn lookup(&self, user: UserId) -> Option<ChannelHandle> {
        self.channels
            .read()
            .await
            .get(&user)
            .filter(|handle| handle.is_open())
            .cloned()
    }

    /// Remove the binding of `user` only if it still points at `connection`.
    /// A close event from a replaced channel therefore cannot evict the
    /// newer one. Returns `true` if a binding was removed.
    pub async fn unbind(&self, user: UserId, connection: ConnectionId) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(&user) {
            Some(current) if current.id() == connection => {
                channels.remove(&user);
                info!(user_id = %user, connection = %connection.short(), "User offline");
                true
            }
            Some(_) => {
                debug!(
                    user_id = %user,
                    connection = %connection.short(),
                    "Ignoring close of replaced connection"
                );
                false
            }
            None => false,
        }
    }

    pub async fn online_count(&self) -> usize {
        self.channels.read().await.len()
    }
}
