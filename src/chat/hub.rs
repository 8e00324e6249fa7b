use std::collections::HashMap;

use tokio::sync::{
    RwLock,
    mpsc::{self, error::TrySendError},
};
use tracing::{info, warn};

use crate::presence::{ConnId, Presence, UserId};

use super::events::ServerEvent;

/// Frames a connection may have queued before new ones are dropped.
pub const OUTBOX_CAPACITY: usize = 64;

pub type Outbox = mpsc::Sender<ServerEvent>;

/// Live connections and the presence registry.
#[derive(Debug, Default)]
pub struct Hub {
    presence: RwLock<Presence>,
    outboxes: RwLock<HashMap<ConnId, Outbox>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh socket. Frames queued on the outbox come out of the receiver.
    pub async fn connect(&self) -> (ConnId, Outbox, mpsc::Receiver<ServerEvent>) {
        let conn = ConnId::new();
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        self.outboxes.write().await.insert(conn, tx.clone());
        (conn, tx, rx)
    }

    pub async fn join(&self, user: UserId, conn: ConnId) {
        info!(%conn, %user, "joined");
        self.presence.write().await.join(user, conn);
    }

    pub async fn user_of(&self, conn: ConnId) -> Option<UserId> {
        self.presence.read().await.lookup_user(conn)
    }

    pub async fn connection_of(&self, user: &UserId) -> Option<ConnId> {
        self.presence.read().await.lookup_connection(user)
    }

    /// Queues `event` for `conn`. False when the socket is gone or not keeping up.
    pub async fn emit(&self, conn: ConnId, event: ServerEvent) -> bool {
        match self.outboxes.read().await.get(&conn) {
            Some(tx) => offer(conn, tx, event),
            None => false,
        }
    }

    pub async fn disconnect(&self, conn: ConnId) -> Option<UserId> {
        self.outboxes.write().await.remove(&conn);
        self.presence.write().await.remove(conn)
    }

    pub async fn online(&self) -> usize {
        self.presence.read().await.online()
    }
}

/// Non-blocking send; a full outbox drops the frame.
pub(crate) fn offer(conn: ConnId, tx: &Outbox, event: ServerEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(%conn, "outbox full, dropping frame");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
