pub mod events;
mod hub;
mod msg;
mod ws;

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use futures_util::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    AppState, ChatError, GetField,
    presence::ConnId,
    store::{MessageStore, ProfileDirectory, StoreError},
};

pub use hub::{Hub, OUTBOX_CAPACITY, Outbox};

use events::Ack;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::chat_ws))
}

/// Everything a socket needs to process events.
#[derive(Debug, Clone)]
pub struct Chat<S> {
    pub(crate) store: S,
    pub(crate) hub: Arc<Hub>,
    pub(crate) store_timeout: Duration,
}

impl<S> Chat<S> {
    pub fn new(store: S, hub: Arc<Hub>, store_timeout: Duration) -> Self {
        Self { store, hub, store_timeout }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> Chat<S>
where
    S: MessageStore + ProfileDirectory + Sync,
{
    /// Handles one inbound text frame from `conn`. Malformed frames are dropped.
    pub async fn dispatch(&self, conn: ConnId, outbox: &Outbox, frame: &str) {
        let Ok(frame) = serde_json::from_str::<Value>(frame) else {
            debug!(%conn, "dropping non-json frame");
            return;
        };
        let Ok(event) = frame.get_str_field("event") else {
            debug!(%conn, "dropping frame without event");
            return;
        };
        let data = frame.get("data").unwrap_or(&Value::Null);

        match event {
            "join" => match data.as_str() {
                Some(user) if !user.is_empty() => self.hub.join(user.into(), conn).await,
                _ => debug!(%conn, "join without user id"),
            },
            "sendMessage" => {
                let ack_id = frame.get("ack").and_then(Value::as_u64);
                let ack = Ack::new(ack_id, conn, outbox.clone());
                let outcome = self.send_guarded(conn, data).await;
                ack.resolve(&outcome);
            }
            other => debug!(%conn, event = other, "unknown event"),
        }
    }

    async fn send_guarded(
        &self,
        conn: ConnId,
        data: &Value,
    ) -> Result<events::EnrichedMessage, ChatError> {
        let outcome = AssertUnwindSafe(self.send_msg(conn, data))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(%conn, "sendMessage handler panicked");
                Err(ChatError::Store(StoreError::Aborted))
            });

        if let Err(e) = &outcome {
            warn!(%conn, error = %e, "sendMessage failed");
        }
        outcome
    }
}
